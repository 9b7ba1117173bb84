// ============================================================================
// READBACK: copy an RGBA render target back to CPU memory
// ============================================================================

use image::RgbaImage;

use super::context::GpuContext;
use crate::error::{RenderError, RenderResult};

/// WGPU requires `bytes_per_row` in texture→buffer copies to be a multiple of 256.
pub const COPY_BYTES_PER_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Row stride for a `width`-pixel RGBA8 row, padded to the copy alignment.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Vertical order of rows in a readback buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image.
    TopDown,
    /// First row is the bottom of the image.
    BottomUp,
}

/// Pixels read back from an offscreen render.
#[derive(Clone, Debug, PartialEq)]
pub struct OffscreenFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub row_order: RowOrder,
}

impl OffscreenFrame {
    /// Normalise to top-left origin.
    pub fn to_top_down(mut self) -> Self {
        if self.row_order == RowOrder::BottomUp {
            flip_rows(&mut self.pixels, self.width as usize * 4);
            self.row_order = RowOrder::TopDown;
        }
        self
    }

    /// Top-down RGBA image.  `None` if the pixel count is inconsistent.
    pub fn into_image(self) -> Option<RgbaImage> {
        let frame = self.to_top_down();
        RgbaImage::from_raw(frame.width, frame.height, frame.pixels)
    }
}

/// Reverse the order of `row_bytes`-wide rows in place.
pub fn flip_rows(pixels: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = pixels.len() / row_bytes;
    for y in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * row_bytes);
        top[y * row_bytes..(y + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
}

/// Copy an RGBA8 texture into a staging buffer and return tightly packed
/// rows, top-down.  Blocks on `device.poll`.
pub fn readback_texture(ctx: &GpuContext, texture: &wgpu::Texture, width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let device = &ctx.device;
    let bytes_per_row = aligned_bytes_per_row(width);
    let buffer_size = (bytes_per_row * height) as u64;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging"),
        size: buffer_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    ctx.submit_one(encoder);

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(RenderError::Readback(format!("map error: {e:?}"))),
        Err(e) => return Err(RenderError::Readback(format!("channel error: {e}"))),
    }

    let mapped = slice.get_mapped_range();
    let actual_row = width as usize * 4;
    let mut result = Vec::with_capacity(actual_row * height as usize);
    for y in 0..height as usize {
        let start = y * bytes_per_row as usize;
        result.extend_from_slice(&mapped[start..start + actual_row]);
    }
    drop(mapped);
    staging.unmap();

    Ok(result)
}
