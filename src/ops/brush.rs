// ============================================================================
// FREEHAND STROKE: brush / eraser rasterization into the mask
// ============================================================================

use crate::canvas::MaskBuffer;

/// Softness values at or below this paint a hard-edged disc.
const SOFTNESS_EPSILON: f32 = 1e-3;

/// Stamps closer than this (in pixels) add nothing a pixel-centre sample
/// could see.
const MIN_STEP: f32 = 0.25;

/// Whether a stroke reveals the effect or hides it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushMode {
    /// Paint toward 255 (apply the effect).
    #[default]
    Reveal,
    /// Paint toward 0 (restore the original).
    Hide,
}

impl BrushMode {
    pub fn target(self) -> u8 {
        match self {
            BrushMode::Reveal => MaskBuffer::SELECTED,
            BrushMode::Hide => MaskBuffer::UNSELECTED,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    /// Disc radius in mask pixels.
    pub radius: f32,
    /// 0 = hard edge, 1 = linear falloff across the whole radius.
    pub softness: f32,
    pub mode: BrushMode,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 24.0,
            softness: 0.5,
            mode: BrushMode::Reveal,
        }
    }
}

impl BrushSettings {
    /// Maximum allowed distance between consecutive stamps.
    pub fn step(&self) -> f32 {
        (self.radius / 4.0).max(MIN_STEP)
    }

    /// `false` for zero, negative or non-finite radii, which paint nothing.
    pub fn is_paintable(&self) -> bool {
        self.radius.is_finite() && self.radius > 0.0
    }

    /// Coverage (0..1) of a stamp at `dist` pixels from its centre.
    pub fn coverage(&self, dist: f32) -> f32 {
        let radius = self.radius;
        if radius <= 0.0 || dist >= radius {
            return 0.0;
        }
        let softness = self.softness.clamp(0.0, 1.0);
        if softness <= SOFTNESS_EPSILON {
            return 1.0;
        }
        let solid = radius * (1.0 - softness);
        if dist <= solid {
            1.0
        } else {
            (radius - dist) / (radius - solid)
        }
    }
}

/// Expand a pointer path into stamp centres.
///
/// Consecutive points farther apart than `step` get `ceil(distance / step)`
/// evenly spaced stamps so the painted trail has no gaps, whatever the
/// pointer sampling rate was.
pub fn stamp_points(points: &[(f32, f32)], step: f32) -> Vec<(f32, f32)> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut stamps = Vec::with_capacity(points.len());
    stamps.push(first);
    let step = if step.is_finite() { step.max(MIN_STEP) } else { f32::INFINITY };

    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let dx = x1 - x0;
        let dy = y1 - y0;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance > step {
            let count = (distance / step).ceil() as usize;
            for i in 1..=count {
                let t = i as f32 / count as f32;
                stamps.push((x0 + dx * t, y0 + dy * t));
            }
        } else {
            stamps.push((x1, y1));
        }
    }
    stamps
}

/// Paint one disc, compositing "over" toward the brush target so overlapping
/// stamps never push a pixel past it.
pub fn paint_stamp(mask: &mut MaskBuffer, center: (f32, f32), brush: &BrushSettings) {
    let radius = brush.radius;
    if radius <= 0.0 {
        return;
    }
    let (w, h) = mask.dimensions();
    let min_x = (center.0 - radius).floor().max(0.0) as u32;
    let min_y = (center.1 - radius).floor().max(0.0) as u32;
    let max_x = ((center.0 + radius).ceil().max(0.0) as u32).min(w);
    let max_y = ((center.1 + radius).ceil().max(0.0) as u32).min(h);
    let target = brush.mode.target() as f32;

    for y in min_y..max_y {
        for x in min_x..max_x {
            let dx = x as f32 + 0.5 - center.0;
            let dy = y as f32 + 0.5 - center.1;
            let alpha = brush.coverage((dx * dx + dy * dy).sqrt());
            if alpha <= 0.0 {
                continue;
            }
            let old = mask.get(x, y) as f32;
            let new = old + (target - old) * alpha;
            mask.set(x, y, new.round().clamp(0.0, 255.0) as u8);
        }
    }
}

/// Rasterize a whole stroke.  Returns the number of stamps painted.
pub fn apply_stroke(mask: &mut MaskBuffer, points: &[(f32, f32)], brush: &BrushSettings) -> usize {
    if !brush.is_paintable() {
        tracing::debug!(radius = brush.radius, "brush radius not paintable; stroke ignored");
        return 0;
    }
    let stamps = stamp_points(points, brush.step());
    for &center in &stamps {
        paint_stamp(mask, center, brush);
    }
    tracing::trace!(stamps = stamps.len(), radius = brush.radius, "brush stroke applied");
    stamps.len()
}
