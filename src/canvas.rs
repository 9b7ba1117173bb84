// ============================================================================
// CANVAS: selection mask storage and the editor that owns it
// ============================================================================

use image::{GrayImage, Luma};
use image::imageops::{self, FilterType};

// ============================================================================
// MASK BUFFER
// ============================================================================

/// Single-channel selection raster, the same size as the working image.
///
/// 255 means "apply the effect here", 0 means "keep the original pixel".
/// Values in between blend linearly.  The `u8` storage keeps every value in
/// range by construction.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskBuffer {
    pixels: GrayImage,
}

impl MaskBuffer {
    pub const SELECTED: u8 = 255;
    pub const UNSELECTED: u8 = 0;

    /// A new mask with the effect applied everywhere.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Self::SELECTED)
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            pixels: GrayImage::from_pixel(width, height, Luma([value])),
        }
    }

    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Build a mask from raw row-major bytes.  Returns `None` when the byte
    /// count does not match `width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(Self::from_gray)
    }

    pub fn width(&self) -> u32 { self.pixels.width() }

    pub fn height(&self) -> u32 { self.pixels.height() }

    pub fn dimensions(&self) -> (u32, u32) { self.pixels.dimensions() }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y).0[0]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.pixels.put_pixel(x, y, Luma([value]));
    }

    /// Bounds-checked read; out-of-range coordinates return `None`.
    pub fn try_get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return None;
        }
        Some(self.get(x as u32, y as u32))
    }

    /// Select everything (effect applied everywhere).
    pub fn fill(&mut self) {
        self.fill_with(Self::SELECTED);
    }

    /// Deselect everything (original image everywhere).
    pub fn clear(&mut self) {
        self.fill_with(Self::UNSELECTED);
    }

    pub fn fill_with(&mut self, value: u8) {
        for p in self.pixels.iter_mut() {
            *p = value;
        }
    }

    /// `v -> 255 - v` on every pixel.
    pub fn invert(&mut self) {
        for p in self.pixels.iter_mut() {
            *p = 255 - *p;
        }
    }

    /// Bilinear rescale to a new size, preserving the selection's shape.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self {
            pixels: imageops::resize(&self.pixels, width, height, FilterType::Triangle),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Fraction of pixels above the midpoint.
    pub fn coverage(&self) -> f32 {
        let total = self.pixels.len();
        if total == 0 {
            return 0.0;
        }
        let selected = self.pixels.iter().filter(|&&v| v > 127).count();
        selected as f32 / total as f32
    }

    pub fn is_uniform(&self, value: u8) -> bool {
        self.pixels.iter().all(|&v| v == value)
    }
}

// ============================================================================
// CHANGE NOTIFICATION
// ============================================================================

/// Receives the mask after every mutation.  The render pipeline implements
/// this to re-upload its mask texture; the editing side never sees the GPU.
pub trait MaskObserver {
    fn on_mask_changed(&mut self, mask: &MaskBuffer);
}

/// Observer that ignores notifications (headless mask editing).
#[derive(Debug, Default)]
pub struct DetachedObserver;

impl MaskObserver for DetachedObserver {
    fn on_mask_changed(&mut self, _mask: &MaskBuffer) {}
}

// ============================================================================
// MASK EDITOR: sole owner of the mask, notifies synchronously
// ============================================================================

/// Owns the [`MaskBuffer`] and funnels every mutation through one call path
/// that ends in [`MaskObserver::on_mask_changed`].  The observer has seen the
/// new contents by the time any mutating method returns.
pub struct MaskEditor<O: MaskObserver> {
    mask: MaskBuffer,
    observer: O,
}

impl<O: MaskObserver> MaskEditor<O> {
    /// Takes ownership of `mask` and immediately publishes it to `observer`.
    pub fn new(mask: MaskBuffer, mut observer: O) -> Self {
        observer.on_mask_changed(&mask);
        Self { mask, observer }
    }

    pub fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Run `f` against the mask, then notify.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut MaskBuffer) -> R) -> R {
        let result = f(&mut self.mask);
        self.observer.on_mask_changed(&self.mask);
        result
    }

    pub fn fill(&mut self) {
        self.edit(MaskBuffer::fill);
    }

    pub fn clear(&mut self) {
        self.edit(MaskBuffer::clear);
    }

    pub fn invert(&mut self) {
        self.edit(MaskBuffer::invert);
    }

    /// Swap in a whole new mask (e.g. after an image load).
    pub fn replace(&mut self, mask: MaskBuffer) {
        self.edit(|m| *m = mask);
    }

    /// Rescale to follow an image resize.
    pub fn resize_to(&mut self, width: u32, height: u32) {
        self.edit(|m| *m = m.resized(width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recorder {
        uploads: Vec<Vec<u8>>,
    }

    impl MaskObserver for Recorder {
        fn on_mask_changed(&mut self, mask: &MaskBuffer) {
            self.uploads.push(mask.as_raw().to_vec());
        }
    }

    #[test]
    fn new_mask_applies_effect_everywhere() {
        let m = MaskBuffer::new(8, 4);
        assert_eq!(m.dimensions(), (8, 4));
        assert!(m.is_uniform(255));
        assert_eq!(m.coverage(), 1.0);
    }

    #[test]
    fn fill_and_clear_are_idempotent() {
        let mut m = MaskBuffer::filled(5, 5, 77);
        m.fill();
        let once = m.clone();
        m.fill();
        assert_eq!(m, once);

        m.clear();
        let once = m.clone();
        m.clear();
        assert_eq!(m, once);
        assert!(m.is_uniform(0));
    }

    #[test]
    fn try_get_rejects_out_of_bounds() {
        let m = MaskBuffer::new(3, 3);
        assert_eq!(m.try_get(-1, 0), None);
        assert_eq!(m.try_get(3, 0), None);
        assert_eq!(m.try_get(2, 2), Some(255));
    }

    #[test]
    fn resize_preserves_selected_half() {
        let mut m = MaskBuffer::filled(10, 10, 0);
        for y in 0..10 {
            for x in 0..5 {
                m.set(x, y, 255);
            }
        }
        let big = m.resized(40, 40);
        assert_eq!(big.dimensions(), (40, 40));
        assert_eq!(big.get(2, 20), 255);
        assert_eq!(big.get(37, 20), 0);
    }

    #[test]
    fn editor_notifies_after_every_mutation() {
        let mut editor = MaskEditor::new(MaskBuffer::new(2, 2), Recorder::default());
        assert_eq!(editor.observer().uploads.len(), 1);

        editor.clear();
        editor.invert();
        editor.edit(|m| m.set(0, 0, 10));

        let uploads = &editor.observer().uploads;
        assert_eq!(uploads.len(), 4);
        assert_eq!(uploads[1], vec![0, 0, 0, 0]);
        assert_eq!(uploads[2], vec![255, 255, 255, 255]);
        assert_eq!(uploads[3], vec![10, 255, 255, 255]);
    }

    #[test]
    fn editor_resize_publishes_new_size() {
        let mut editor = MaskEditor::new(MaskBuffer::new(4, 4), Recorder::default());
        editor.resize_to(8, 2);
        assert_eq!(editor.mask().dimensions(), (8, 2));
        assert_eq!(editor.observer().uploads.last().map(Vec::len), Some(16));
    }

    fn arb_mask() -> impl Strategy<Value = MaskBuffer> {
        (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h) as usize)
                .prop_map(move |data| MaskBuffer::from_raw(w, h, data).unwrap())
        })
    }

    proptest! {
        #[test]
        fn invert_is_involutive(mask in arb_mask()) {
            let mut m = mask.clone();
            m.invert();
            m.invert();
            prop_assert_eq!(m, mask);
        }

        #[test]
        fn invert_maps_each_value(mask in arb_mask()) {
            let mut m = mask.clone();
            m.invert();
            for (a, b) in mask.as_raw().iter().zip(m.as_raw()) {
                prop_assert_eq!(*a as u16 + *b as u16, 255);
            }
        }
    }
}
