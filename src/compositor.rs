// ============================================================================
// MASK COMPOSITING: CPU reference for `apply_mask` in the shader prelude
// ============================================================================
//
// final = mix(original, effect, mask * intensity)
//
// The GPU side does this in every fragment program through the prelude's
// `apply_mask` helper.  This module is the same formula on bytes, used to
// check GPU output and to preview masks without a device.

use image::{GrayImage, Rgba, RgbaImage};

/// Blend weight for one pixel: mask (0..255 → 0..1) times clamped intensity.
#[inline]
pub fn blend_weight(mask: u8, intensity: f32) -> f32 {
    (mask as f32 / 255.0) * intensity.clamp(0.0, 1.0)
}

/// `mix(a, b, t)` per channel, rounded back to u8.
#[inline]
pub fn mix_pixel(original: [u8; 4], effect: [u8; 4], mask: u8, intensity: f32) -> [u8; 4] {
    let t = blend_weight(mask, intensity);
    if t <= 0.0 {
        return original;
    }
    let mut out = [0u8; 4];
    for c in 0..4 {
        let a = original[c] as f32;
        let b = effect[c] as f32;
        out[c] = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Whole-image composite.  All three rasters must share a size; returns
/// `None` otherwise.
pub fn composite(original: &RgbaImage, effect: &RgbaImage, mask: &GrayImage, intensity: f32) -> Option<RgbaImage> {
    let dims = original.dimensions();
    if effect.dimensions() != dims || mask.dimensions() != dims {
        tracing::warn!(
            original = ?dims,
            effect = ?effect.dimensions(),
            mask = ?mask.dimensions(),
            "composite size mismatch"
        );
        return None;
    }
    let (w, h) = dims;
    Some(RgbaImage::from_fn(w, h, |x, y| {
        Rgba(mix_pixel(
            original.get_pixel(x, y).0,
            effect.get_pixel(x, y).0,
            mask.get_pixel(x, y).0[0],
            intensity,
        ))
    }))
}
