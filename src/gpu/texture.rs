// ============================================================================
// CANVAS TEXTURES: source image, mask and render target wrappers
// ============================================================================

use image::RgbaImage;

use crate::canvas::MaskBuffer;

/// Format of the canvas and offscreen targets.  Readback and PNG encoding
/// assume 4 bytes per pixel in RGBA order.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Format of the mask texture.  The shader reads it through `.r`.
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// A sampled 2D texture plus its default view.
pub struct CanvasTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl CanvasTexture {
    fn create(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Source image texture (RGBA8, sampled by the fragment program).
    pub fn from_image(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let tex = Self::create(
            device,
            "source_image",
            width,
            height,
            TARGET_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        tex.upload_full(queue, image.as_raw());
        tex
    }

    /// Mask texture (R8).  Re-uploaded in full after every mask edit.
    pub fn for_mask(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::create(
            device,
            "selection_mask",
            width,
            height,
            MASK_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    pub fn from_mask(device: &wgpu::Device, queue: &wgpu::Queue, mask: &MaskBuffer) -> Self {
        let tex = Self::for_mask(device, mask.width(), mask.height());
        tex.upload_full(queue, mask.as_raw());
        tex
    }

    /// Render target that can be drawn into and copied out for readback.
    pub fn render_target(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        Self::create(
            device,
            label,
            width,
            height,
            TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.block_copy_size(None).unwrap_or(4)
    }

    /// Full re-upload.  `data` must hold `width * height * bytes_per_pixel` bytes.
    pub fn upload_full(&self, queue: &wgpu::Queue, data: &[u8]) {
        let bpp = self.bytes_per_pixel();
        debug_assert_eq!(data.len(), (self.width * self.height * bpp) as usize);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bpp * self.width),
                rows_per_image: Some(self.height),
            },
            extent(self.width, self.height),
        );
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
