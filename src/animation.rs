// ============================================================================
// ANIMATION: per-canvas render parameters and the frame clock
// ============================================================================

use std::time::Instant;

/// Host-side frame primitive (a window's redraw request, a timer, a loop).
/// Called at most once per [`tick`](crate::gpu::ShaderCanvas::tick).
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Counts requests; enough for headless loops and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingScheduler {
    pub requested: u32,
}

impl FrameScheduler for CountingScheduler {
    fn request_frame(&mut self) {
        self.requested += 1;
    }
}

/// Per-canvas render parameters written into the uniform block each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    intensity: f32,
    started_at: Option<Instant>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self { intensity: 1.0, started_at: None }
    }
}

impl RenderParams {
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Clamped to [0,1]; NaN is treated as 0.
    pub fn set_intensity(&mut self, value: f32) {
        self.intensity = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    }

    pub fn is_animating(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start the clock.  Already-running animations keep their start time.
    pub fn start_animating(&mut self) {
        self.start_animating_at(Instant::now());
    }

    pub fn start_animating_at(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn stop_animating(&mut self) {
        self.started_at = None;
    }

    /// Seconds since the animation started, or 0 when stopped.
    pub fn elapsed_at(&self, now: Instant) -> f32 {
        match self.started_at {
            Some(start) => now.saturating_duration_since(start).as_secs_f32(),
            None => 0.0,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed_at(Instant::now())
    }
}
