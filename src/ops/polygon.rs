// ============================================================================
// POLYGON RASTERIZATION: normalised vertex loops from a segmenter
// ============================================================================

use std::path::Path;

use crate::canvas::MaskBuffer;

/// One closed loop of `[x, y]` vertices in normalised [0,1]² coordinates.
pub type PolygonLoop = Vec<[f32; 2]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Clear the mask to 0, then fill every loop with 255.
    #[default]
    Replace,
    /// Fill every loop with 255, keeping what is already selected.
    Additive,
}

fn loop_is_usable(points: &[[f32; 2]]) -> bool {
    points.len() >= 3 && points.iter().all(|p| p[0].is_finite() && p[1].is_finite())
}

/// Even-odd scanline fill of one loop, sampled at pixel centres.
/// `points` are already in pixel space.
fn fill_loop(mask: &mut MaskBuffer, points: &[(f32, f32)]) -> usize {
    let (w, h) = mask.dimensions();
    let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
    let y_start = (min_y - 0.5).ceil().max(0.0) as u32;
    let y_end = ((max_y - 0.5).floor() + 1.0).clamp(0.0, h as f32) as u32;

    let mut crossings: Vec<f32> = Vec::with_capacity(8);
    let mut filled = 0;
    for y in y_start..y_end {
        let sy = y as f32 + 0.5;
        crossings.clear();
        let n = points.len();
        for i in 0..n {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            // Half-open in y so shared vertices count once.
            if (y0 <= sy && sy < y1) || (y1 <= sy && sy < y0) {
                let t = (sy - y0) / (y1 - y0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            // Pixel x is inside when its centre x + 0.5 lies in [left, right).
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(w as f32);
            if end <= start {
                continue;
            }
            for x in start as u32..end as u32 {
                mask.set(x, y, MaskBuffer::SELECTED);
                filled += 1;
            }
        }
    }
    filled
}

/// Rasterize `loops` into the mask.  Each loop is filled on its own, so a
/// loop nested inside another adds rather than cuts a hole.  Loops with
/// fewer than three vertices or non-finite coordinates are skipped; when none
/// are left the mask is not touched, even in Replace mode.
/// Returns the number of loops drawn.
pub fn rasterize_polygons(mask: &mut MaskBuffer, loops: &[PolygonLoop], mode: PolygonMode) -> usize {
    let usable: Vec<(usize, &PolygonLoop)> = loops
        .iter()
        .enumerate()
        .filter(|(i, points)| {
            let ok = loop_is_usable(points);
            if !ok {
                tracing::debug!(index = i, vertices = points.len(), "skipping degenerate polygon loop");
            }
            ok
        })
        .collect();
    if usable.is_empty() {
        tracing::debug!(total = loops.len(), ?mode, "no usable polygon loops; mask unchanged");
        return 0;
    }

    if mode == PolygonMode::Replace {
        mask.clear();
    }
    let (w, h) = (mask.width() as f32, mask.height() as f32);
    for &(i, points) in &usable {
        let pixel_space: Vec<(f32, f32)> = points.iter().map(|p| (p[0] * w, p[1] * h)).collect();
        let filled = fill_loop(mask, &pixel_space);
        tracing::trace!(index = i, filled, "polygon loop rasterized");
    }
    tracing::debug!(drawn = usable.len(), total = loops.len(), ?mode, "polygons rasterized");
    usable.len()
}

/// Parse `[[[x, y], ...], ...]` JSON into loops.
pub fn parse_polygons(json: &str) -> serde_json::Result<Vec<PolygonLoop>> {
    serde_json::from_str(json)
}

pub fn load_polygons(path: &Path) -> std::io::Result<Vec<PolygonLoop>> {
    let text = std::fs::read_to_string(path)?;
    parse_polygons(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> PolygonLoop {
        vec![[0.25, 0.25], [0.75, 0.25], [0.75, 0.75], [0.25, 0.75]]
    }

    #[test]
    fn centered_square_fills_inside_only() {
        let mut mask = MaskBuffer::new(100, 100);
        assert_eq!(rasterize_polygons(&mut mask, &[square()], PolygonMode::Replace), 1);
        assert_eq!(mask.get(50, 50), 255);
        assert_eq!(mask.get(5, 5), 0);
        // edges: x in [25, 75)
        assert_eq!(mask.get(25, 50), 255);
        assert_eq!(mask.get(74, 50), 255);
        assert_eq!(mask.get(75, 50), 0);
        assert_eq!(mask.get(24, 50), 0);
    }

    #[test]
    fn square_area_matches_pixel_count() {
        let mut mask = MaskBuffer::new(100, 100);
        rasterize_polygons(&mut mask, &[square()], PolygonMode::Replace);
        let count = mask.as_raw().iter().filter(|&&v| v == 255).count();
        assert_eq!(count, 50 * 50);
    }

    #[test]
    fn additive_keeps_existing_selection() {
        let mut mask = MaskBuffer::filled(100, 100, 0);
        mask.set(2, 2, 255);
        rasterize_polygons(&mut mask, &[square()], PolygonMode::Additive);
        assert_eq!(mask.get(2, 2), 255);
        assert_eq!(mask.get(50, 50), 255);
    }

    #[test]
    fn degenerate_loops_leave_mask_unchanged() {
        let mut mask = MaskBuffer::filled(10, 10, 255);
        let loops = vec![
            vec![[0.0, 0.0], [1.0, 1.0]],
            vec![[0.0, 0.0], [f32::NAN, 0.5], [1.0, 1.0]],
        ];
        assert_eq!(rasterize_polygons(&mut mask, &loops, PolygonMode::Replace), 0);
        assert!(mask.is_uniform(255));

        assert_eq!(rasterize_polygons(&mut mask, &[], PolygonMode::Replace), 0);
        assert!(mask.is_uniform(255));

        let mut kept = MaskBuffer::filled(10, 10, 9);
        rasterize_polygons(&mut kept, &loops, PolygonMode::Additive);
        assert!(kept.is_uniform(9));
    }

    #[test]
    fn replace_skips_bad_loops_but_draws_good_ones() {
        let mut mask = MaskBuffer::filled(100, 100, 255);
        let loops = vec![vec![[0.0, 0.0], [1.0, 1.0]], square()];
        assert_eq!(rasterize_polygons(&mut mask, &loops, PolygonMode::Replace), 1);
        assert_eq!(mask.get(5, 5), 0);
        assert_eq!(mask.get(50, 50), 255);
    }

    #[test]
    fn triangle_respects_slanted_edge() {
        let mut mask = MaskBuffer::filled(10, 10, 0);
        let tri = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        rasterize_polygons(&mut mask, &[tri], PolygonMode::Additive);
        assert_eq!(mask.get(0, 0), 255);
        assert_eq!(mask.get(1, 7), 255);
        assert_eq!(mask.get(9, 9), 0);
        assert_eq!(mask.get(6, 6), 0);
    }

    #[test]
    fn nested_loops_both_fill() {
        let mut mask = MaskBuffer::new(100, 100);
        let inner = vec![[0.4, 0.4], [0.6, 0.4], [0.6, 0.6], [0.4, 0.6]];
        rasterize_polygons(&mut mask, &[square(), inner], PolygonMode::Replace);
        assert_eq!(mask.get(50, 50), 255);
    }

    #[test]
    fn parses_json_loops() {
        let loops = parse_polygons("[[[0.1,0.1],[0.9,0.1],[0.5,0.9]]]").unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0][2], [0.5, 0.9]);
        assert!(parse_polygons("{\"not\": \"loops\"}").is_err());
    }
}
