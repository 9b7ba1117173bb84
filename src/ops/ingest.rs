// ============================================================================
// EXTERNAL RASTER INGESTION: segmenter output / offscreen readback → mask
// ============================================================================

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

use crate::canvas::MaskBuffer;

/// Values above this count as selected when merging.
pub const MERGE_THRESHOLD: u8 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// The raster becomes the mask.
    #[default]
    Replace,
    /// Pixels above [`MERGE_THRESHOLD`] become 255; everything else is kept.
    Merge,
}

/// Single-channel raster from the red channel of an RGBA raster.
pub fn red_channel(rgba: &RgbaImage) -> GrayImage {
    let (w, h) = rgba.dimensions();
    let data: Vec<u8> = rgba.as_raw().chunks_exact(4).map(|px| px[0]).collect();
    // Length is w*h by construction.
    GrayImage::from_raw(w, h, data).unwrap_or_else(|| GrayImage::new(w, h))
}

/// Write `raster` into the mask, resampling first if the sizes differ.
pub fn ingest_raster(mask: &mut MaskBuffer, raster: &GrayImage, mode: IngestMode) {
    let (mw, mh) = mask.dimensions();
    let resampled;
    let source = if raster.dimensions() != (mw, mh) {
        tracing::debug!(
            from = ?raster.dimensions(),
            to = ?(mw, mh),
            "resampling ingested raster to mask size"
        );
        resampled = imageops::resize(raster, mw, mh, FilterType::Triangle);
        &resampled
    } else {
        raster
    };

    let dst = mask.raw_mut();
    match mode {
        IngestMode::Replace => dst.copy_from_slice(source.as_raw()),
        IngestMode::Merge => {
            for (d, &s) in dst.iter_mut().zip(source.as_raw()) {
                if s > MERGE_THRESHOLD {
                    *d = MaskBuffer::SELECTED;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    #[test]
    fn red_channel_picks_first_byte() {
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([(x * 10 + y) as u8, 200, 100, 255]));
        let red = red_channel(&img);
        assert_eq!(red.dimensions(), (3, 2));
        assert_eq!(red.get_pixel(2, 1).0[0], 21);
    }

    #[test]
    fn replace_copies_values() {
        let mut mask = MaskBuffer::new(2, 2);
        let raster = GrayImage::from_raw(2, 2, vec![0, 50, 100, 200]).unwrap();
        ingest_raster(&mut mask, &raster, IngestMode::Replace);
        assert_eq!(mask.as_raw(), &[0, 50, 100, 200]);
    }

    #[test]
    fn merge_only_adds_above_threshold() {
        let mut mask = MaskBuffer::from_raw(4, 1, vec![10, 10, 200, 0]).unwrap();
        let raster = GrayImage::from_raw(4, 1, vec![127, 128, 0, 255]).unwrap();
        ingest_raster(&mut mask, &raster, IngestMode::Merge);
        assert_eq!(mask.as_raw(), &[10, 255, 200, 255]);
    }

    #[test]
    fn mismatched_raster_is_resampled() {
        let mut mask = MaskBuffer::filled(40, 40, 0);
        let raster = GrayImage::from_pixel(10, 10, Luma([255]));
        ingest_raster(&mut mask, &raster, IngestMode::Replace);
        assert_eq!(mask.dimensions(), (40, 40));
        assert!(mask.is_uniform(255));
    }
}
