// ============================================================================
// IMAGE I/O: decoding, downscaling, PNG / base64 encoding
// ============================================================================

use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageEncoder, ImageError, RgbaImage};
use std::path::Path;

use crate::ops::ingest;

/// Decode any format the `image` crate supports into RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, ImageError> {
    let img = image::open(path)?.to_rgba8();
    tracing::debug!(path = %path.display(), width = img.width(), height = img.height(), "image decoded");
    Ok(img)
}

/// Largest size with the same aspect ratio that fits in a `max_dim` box.
/// Never upscales and never returns a zero side.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim || longest == 0 {
        return (width, height);
    }
    let scale = max_dim as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_dim);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_dim);
    (w, h)
}

/// Downscale so the longer side is at most `max_dim` (Lanczos3).
pub fn cap_dimensions(image: RgbaImage, max_dim: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (nw, nh) = fit_within(w, h, max_dim);
    if (nw, nh) == (w, h) {
        return image;
    }
    tracing::info!(from = ?(w, h), to = ?(nw, nh), "downscaling image to working size");
    imageops::resize(&image, nw, nh, FilterType::Lanczos3)
}

/// Aspect-preserving preview that fits in a `max_dim` box.
pub fn thumbnail(image: &RgbaImage, max_dim: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (nw, nh) = fit_within(w, h, max_dim.max(1));
    if (nw, nh) == (w, h) {
        return image.clone();
    }
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::L8,
    )?;
    Ok(buf)
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// `data:image/png;base64,...` for PNG bytes.
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", to_base64(png))
}

/// Load an external mask raster: the red channel of the decoded image.
pub fn load_mask_raster(path: &Path) -> Result<GrayImage, ImageError> {
    let rgba = image::open(path)?.to_rgba8();
    Ok(ingest::red_channel(&rgba))
}
