// ============================================================================
// QUICK SELECT: tolerance flood fill over the source image + disc growth
// ============================================================================

use image::RgbaImage;

use crate::canvas::MaskBuffer;

/// How a selection region is written into the mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Selected pixels become 255.
    #[default]
    Add,
    /// Selected pixels become 0 (modifier-held drag).
    Subtract,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuickSelectOptions {
    /// Per-channel colour tolerance in 0..255 units.
    pub tolerance: f32,
    /// Disc dilation radius applied after the fill (0 = none).
    pub grow_radius: u32,
}

impl Default for QuickSelectOptions {
    fn default() -> Self {
        Self { tolerance: 32.0, grow_radius: 0 }
    }
}

impl QuickSelectOptions {
    /// Squared RGB distance threshold: `3 * tolerance²`.
    pub fn threshold(&self) -> f32 {
        let t = self.tolerance.max(0.0);
        3.0 * t * t
    }
}

/// Transient set of selected pixels, row-major, same size as the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRegion {
    width: u32,
    height: u32,
    selected: Vec<bool>,
}

impl SelectionRegion {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            selected: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.selected[self.index(x, y)]
    }

    /// Out-of-range coordinates are ignored.
    pub fn insert(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.selected[i] = true;
        }
    }

    pub fn len(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.selected.iter().any(|&s| s)
    }

    /// `true` when every pixel selected here is also selected in `other`.
    pub fn is_subset_of(&self, other: &SelectionRegion) -> bool {
        self.selected
            .iter()
            .zip(&other.selected)
            .all(|(&a, &b)| !a || b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width as usize;
        self.selected
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(move |(i, _)| ((i % w) as u32, (i / w) as u32))
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Disc dilation: every pixel within Euclidean distance `radius` of a
    /// selected pixel becomes selected.  Reads from `self` and writes into a
    /// copy, so growth never compounds within one pass.
    pub fn dilated(&self, radius: u32) -> SelectionRegion {
        if radius == 0 {
            return self.clone();
        }
        let r = radius as i64;
        let offsets: Vec<(i64, i64)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();

        let mut grown = self.clone();
        let (w, h) = (self.width as i64, self.height as i64);
        for (x, y) in self.iter() {
            for &(dx, dy) in &offsets {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && nx < w && ny < h {
                    grown.insert(nx as u32, ny as u32);
                }
            }
        }
        grown
    }
}

#[inline(always)]
fn rgb_distance_sq(a: [u8; 4], b: [u8; 4]) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    dr * dr + dg * dg + db * db
}

/// 4-connected flood fill from `seed` over `image`, accepting pixels whose
/// squared RGB distance to the seed colour is within the threshold, then
/// optionally grown.  Seeds outside the image yield an empty region.
pub fn quick_select(image: &RgbaImage, seed: (u32, u32), opts: &QuickSelectOptions) -> SelectionRegion {
    let (w, h) = image.dimensions();
    let mut region = SelectionRegion::empty(w, h);
    if seed.0 >= w || seed.1 >= h {
        tracing::debug!(?seed, width = w, height = h, "quick select seed outside image");
        return region;
    }

    let wu = w as usize;
    let flat = image.as_raw();
    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    }

    let threshold = opts.threshold();
    let seed_idx = seed.1 as usize * wu + seed.0 as usize;
    let reference = pix(flat, seed_idx);

    // `visited` tracks every pixel already tested, accepted or not.
    let mut visited = vec![false; wu * h as usize];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    visited[seed_idx] = true;
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        if rgb_distance_sq(pix(flat, idx), reference) > threshold {
            continue;
        }
        region.selected[idx] = true;

        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        let mut visit = |ni: usize| {
            if !visited[ni] {
                visited[ni] = true;
                stack.push(ni as u32);
            }
        };
        if x > 0 { visit(idx - 1); }
        if x + 1 < w { visit(idx + 1); }
        if y > 0 { visit(idx - wu); }
        if y + 1 < h { visit(idx + wu); }
    }

    if opts.grow_radius > 0 {
        region = region.dilated(opts.grow_radius);
    }
    tracing::debug!(selected = region.len(), tolerance = opts.tolerance, grow = opts.grow_radius, "quick select");
    region
}

/// Drag variant: re-run the fill at every sample along a pointer path and
/// union the results.  Each sample fills against its own colour, so only
/// consecutive repeats of the same pixel are skipped.
pub fn quick_select_path(image: &RgbaImage, path: &[(u32, u32)], opts: &QuickSelectOptions) -> SelectionRegion {
    let (w, h) = image.dimensions();
    let mut union = SelectionRegion::empty(w, h);
    let mut seen: Option<(u32, u32)> = None;
    for &seed in path {
        if seen == Some(seed) {
            continue;
        }
        seen = Some(seed);
        let region = quick_select(image, seed, opts);
        for (dst, &sel) in union.selected.iter_mut().zip(&region.selected) {
            *dst |= sel;
        }
    }
    union
}

/// Write a region into the mask.  Unselected pixels are left as they were.
/// Returns the number of pixels written.
pub fn apply_region(mask: &mut MaskBuffer, region: &SelectionRegion, mode: SelectMode) -> usize {
    if mask.dimensions() != (region.width, region.height) {
        tracing::warn!(
            mask = ?mask.dimensions(),
            region = ?(region.width, region.height),
            "selection region does not match mask size; skipped"
        );
        return 0;
    }
    let value = match mode {
        SelectMode::Add => MaskBuffer::SELECTED,
        SelectMode::Subtract => MaskBuffer::UNSELECTED,
    };
    let raw = mask.raw_mut();
    let mut written = 0;
    for (dst, &sel) in raw.iter_mut().zip(&region.selected) {
        if sel {
            *dst = value;
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    /// Left half red, right half blue, with a 1px green dot at (7, 2).
    fn two_tone() -> RgbaImage {
        let mut img = RgbaImage::from_fn(10, 5, |x, _| {
            if x < 5 { Rgba([200, 10, 10, 255]) } else { Rgba([10, 10, 200, 255]) }
        });
        img.put_pixel(7, 2, Rgba([0, 255, 0, 255]));
        img
    }

    #[test]
    fn threshold_is_three_tolerance_squared() {
        let o = QuickSelectOptions { tolerance: 10.0, grow_radius: 0 };
        assert_eq!(o.threshold(), 300.0);
    }

    #[test]
    fn fills_connected_region_only() {
        let img = two_tone();
        let region = quick_select(&img, (1, 1), &QuickSelectOptions { tolerance: 5.0, grow_radius: 0 });
        assert_eq!(region.len(), 25);
        assert!(region.contains(4, 4));
        assert!(!region.contains(5, 0));
    }

    #[test]
    fn seed_is_always_selected() {
        let img = two_tone();
        let region = quick_select(&img, (7, 2), &QuickSelectOptions { tolerance: 0.0, grow_radius: 0 });
        assert!(region.contains(7, 2));
        assert_eq!(region.len(), 1);
    }

    #[test]
    fn out_of_bounds_seed_selects_nothing() {
        let img = two_tone();
        let region = quick_select(&img, (50, 50), &QuickSelectOptions::default());
        assert!(region.is_empty());
    }

    #[test]
    fn growth_from_single_pixel_is_exact_disc() {
        let img = RgbaImage::from_fn(21, 21, |x, y| Rgba([(x * 12) as u8, (y * 12) as u8, 0, 255]));
        let r = 3u32;
        let region = quick_select(&img, (10, 10), &QuickSelectOptions { tolerance: 0.0, grow_radius: r });
        for y in 0..21i64 {
            for x in 0..21i64 {
                let inside = (x - 10).pow(2) + (y - 10).pow(2) <= (r * r) as i64;
                assert_eq!(region.contains(x as u32, y as u32), inside, "({x},{y})");
            }
        }
        // 29 lattice points within radius 3
        assert_eq!(region.len(), 29);
    }

    #[test]
    fn apply_region_respects_mode_and_leaves_rest() {
        let img = two_tone();
        let region = quick_select(&img, (0, 0), &QuickSelectOptions { tolerance: 5.0, grow_radius: 0 });

        let mut mask = MaskBuffer::filled(10, 5, 100);
        assert_eq!(apply_region(&mut mask, &region, SelectMode::Add), 25);
        assert_eq!(mask.get(0, 0), 255);
        assert_eq!(mask.get(9, 0), 100);

        apply_region(&mut mask, &region, SelectMode::Subtract);
        assert_eq!(mask.get(0, 0), 0);
        assert_eq!(mask.get(9, 0), 100);
    }

    #[test]
    fn drag_path_unions_both_halves() {
        let img = two_tone();
        let opts = QuickSelectOptions { tolerance: 5.0, grow_radius: 0 };
        let region = quick_select_path(&img, &[(0, 0), (1, 0), (9, 4)], &opts);
        // both flat halves, minus the green dot
        assert_eq!(region.len(), 49);
        assert!(!region.contains(7, 2));
    }

    #[test]
    fn drag_refills_from_seed_inside_earlier_region() {
        // red ramp 0, 20, 40, 60; tolerance reaches one step either way
        let img = RgbaImage::from_fn(4, 1, |x, _| Rgba([(x * 20) as u8, 0, 0, 255]));
        let opts = QuickSelectOptions { tolerance: 14.5, grow_radius: 0 };
        assert_eq!(quick_select(&img, (0, 0), &opts).len(), 2);

        let region = quick_select_path(&img, &[(0, 0), (0, 0), (1, 0)], &opts);
        let picked: Vec<_> = region.iter().collect();
        assert_eq!(picked, vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn insert_out_of_range_is_ignored() {
        let mut region = SelectionRegion::empty(2, 2);
        region.insert(5, 0);
        region.insert(0, 9);
        assert!(region.is_empty());
        region.insert(1, 1);
        assert!(region.contains(1, 1));
    }

    #[test]
    fn mismatched_region_is_ignored() {
        let mut mask = MaskBuffer::filled(3, 3, 7);
        let mut region = SelectionRegion::empty(4, 4);
        region.insert(0, 0);
        assert_eq!(apply_region(&mut mask, &region, SelectMode::Add), 0);
        assert!(mask.is_uniform(7));
    }

    fn arb_image() -> impl Strategy<Value = RgbaImage> {
        (2u32..10, 2u32..10).prop_flat_map(|(w, h)| {
            proptest::collection::vec(0u8..4, (w * h) as usize).prop_map(move |levels| {
                let data: Vec<u8> = levels
                    .iter()
                    .flat_map(|&l| [l * 60, 255 - l * 50, l * 20, 255])
                    .collect();
                RgbaImage::from_raw(w, h, data).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn larger_tolerance_never_shrinks(img in arb_image(), t1 in 0.0f32..120.0, dt in 0.0f32..120.0, sx in 0u32..10, sy in 0u32..10) {
            let seed = (sx % img.width(), sy % img.height());
            let small = quick_select(&img, seed, &QuickSelectOptions { tolerance: t1, grow_radius: 0 });
            let large = quick_select(&img, seed, &QuickSelectOptions { tolerance: t1 + dt, grow_radius: 0 });
            prop_assert!(small.contains(seed.0, seed.1));
            prop_assert!(small.is_subset_of(&large));
        }
    }
}
