// ============================================================================
// SESSION: one image, its mask editor and the canvas, tied together
// ============================================================================
//
// All state for one editing session lives here; several sessions can exist
// side by side.  Every mask mutation goes through the editor, which re-uploads
// the mask texture before returning.

use image::{GrayImage, RgbaImage};
use image::imageops::{self, FilterType};

use crate::animation::FrameScheduler;
use crate::canvas::{MaskBuffer, MaskEditor};
use crate::config::Settings;
use crate::error::{RenderError, RenderResult};
use crate::gpu::ShaderCanvas;
use crate::io;
use crate::ops::brush::{self, BrushSettings};
use crate::ops::ingest::{self, IngestMode};
use crate::ops::polygon::{self, PolygonLoop, PolygonMode};
use crate::ops::quick_select::{self, QuickSelectOptions, SelectMode};
use crate::presets::ShaderRecord;

pub struct Session {
    editor: MaskEditor<ShaderCanvas>,
    image: Option<RgbaImage>,
    settings: Settings,
}

impl Session {
    /// Open a GPU context per `settings.preferred_gpu`.
    pub fn new(settings: Settings) -> RenderResult<Self> {
        let canvas = ShaderCanvas::new(&settings.preferred_gpu)?;
        Ok(Self::with_canvas(canvas, settings))
    }

    pub fn with_canvas(mut canvas: ShaderCanvas, settings: Settings) -> Self {
        canvas.set_intensity(settings.intensity);
        Self {
            // Placeholder until an image arrives; the canvas has no size yet.
            editor: MaskEditor::new(MaskBuffer::new(0, 0), canvas),
            image: None,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ========================================================================
    // IMAGE
    // ========================================================================

    /// Cap, bind, and start a fresh all-selected mask.
    pub fn load_image(&mut self, image: RgbaImage) -> RenderResult<()> {
        let image = io::cap_dimensions(image, self.settings.max_image_dim);
        let (w, h) = image.dimensions();
        self.editor.observer_mut().set_image(&image)?;
        self.editor.replace(MaskBuffer::new(w, h));
        self.image = Some(image);
        Ok(())
    }

    /// Resize the image; the mask is rescaled with it.  The target is capped
    /// to `max_image_dim` the same way `load_image` caps its input.
    pub fn resize_image(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let image = self.image.as_ref().ok_or(RenderError::NoImage)?;
        let (width, height) = io::fit_within(width, height, self.settings.max_image_dim);
        let resized = imageops::resize(image, width, height, FilterType::Lanczos3);
        self.editor.observer_mut().set_image(&resized)?;
        self.editor.resize_to(width, height);
        self.image = Some(resized);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.editor.observer_mut().clear_image();
        // Sized-zero placeholder; the canvas has nothing to upload it to.
        self.editor.replace(MaskBuffer::new(0, 0));
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn mask(&self) -> &MaskBuffer {
        self.editor.mask()
    }

    pub fn canvas(&self) -> &ShaderCanvas {
        self.editor.observer()
    }

    pub fn canvas_mut(&mut self) -> &mut ShaderCanvas {
        self.editor.observer_mut()
    }

    // ========================================================================
    // MASK EDITING
    // ========================================================================

    pub fn fill_mask(&mut self) {
        self.editor.fill();
    }

    pub fn clear_mask(&mut self) {
        self.editor.clear();
    }

    pub fn invert_mask(&mut self) {
        self.editor.invert();
    }

    pub fn replace_mask(&mut self, mask: MaskBuffer) {
        self.editor.replace(mask);
    }

    pub fn brush_stroke(&mut self, points: &[(f32, f32)], brush: &BrushSettings) -> usize {
        if points.is_empty() {
            return 0;
        }
        self.editor.edit(|m| brush::apply_stroke(m, points, brush))
    }

    /// Flood fill from `seed` over the source image.  Returns pixels written;
    /// an empty selection leaves the mask (and the GPU copy) untouched.
    pub fn quick_select(&mut self, seed: (u32, u32), opts: &QuickSelectOptions, mode: SelectMode) -> usize {
        let Some(image) = &self.image else { return 0 };
        let region = quick_select::quick_select(image, seed, opts);
        if region.is_empty() {
            return 0;
        }
        self.editor.edit(|m| quick_select::apply_region(m, &region, mode))
    }

    pub fn quick_select_path(&mut self, path: &[(u32, u32)], opts: &QuickSelectOptions, mode: SelectMode) -> usize {
        let Some(image) = &self.image else { return 0 };
        let region = quick_select::quick_select_path(image, path, opts);
        if region.is_empty() {
            return 0;
        }
        self.editor.edit(|m| quick_select::apply_region(m, &region, mode))
    }

    pub fn apply_polygons(&mut self, loops: &[PolygonLoop], mode: PolygonMode) -> usize {
        self.editor.edit(|m| polygon::rasterize_polygons(m, loops, mode))
    }

    pub fn ingest_mask(&mut self, raster: &GrayImage, mode: IngestMode) {
        self.editor.edit(|m| ingest::ingest_raster(m, raster, mode));
    }

    /// Render a heuristic program offscreen and take its red channel as the
    /// mask.  On any error the mask is left as it was.
    pub fn synthesize_mask(&mut self, source: &str, mode: IngestMode) -> RenderResult<()> {
        let frame = self.editor.observer().render_offscreen(source)?;
        let rgba = frame
            .into_image()
            .ok_or_else(|| RenderError::Readback("offscreen frame size mismatch".to_string()))?;
        let raster = ingest::red_channel(&rgba);
        self.ingest_mask(&raster, mode);
        tracing::info!(?mode, coverage = self.mask().coverage(), "mask synthesized from shader");
        Ok(())
    }

    // ========================================================================
    // SHADER + PARAMETERS
    // ========================================================================

    pub fn set_shader(&mut self, source: &str) -> RenderResult<()> {
        self.canvas_mut().set_shader(source)
    }

    pub fn render(&mut self) -> bool {
        self.canvas_mut().render()
    }

    pub fn render_passthrough(&mut self) -> bool {
        self.canvas_mut().render_passthrough()
    }

    pub fn set_intensity(&mut self, value: f32) {
        self.canvas_mut().set_intensity(value);
    }

    pub fn start_animating(&mut self) {
        self.canvas_mut().start_animating();
    }

    pub fn stop_animating(&mut self) {
        self.canvas_mut().stop_animating();
    }

    pub fn tick(&mut self, scheduler: &mut impl FrameScheduler) -> bool {
        self.canvas_mut().tick(scheduler)
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    pub fn export_png(&mut self) -> RenderResult<Vec<u8>> {
        self.canvas_mut().export_png()
    }

    pub fn export_data_url(&mut self) -> RenderResult<String> {
        self.canvas_mut().export_data_url()
    }

    pub fn thumbnail_png(&mut self) -> RenderResult<Vec<u8>> {
        let dim = self.settings.thumbnail_dim;
        self.canvas_mut().thumbnail_png(dim)
    }

    pub fn mask_png(&self) -> RenderResult<Vec<u8>> {
        Ok(io::encode_gray_png(self.mask().as_gray())?)
    }

    /// A record for `source`, with a thumbnail of the current canvas.
    /// Thumbnail failures leave the record without one.
    pub fn shader_record(&mut self, name: &str, source: &str, description: &str) -> ShaderRecord {
        let record = ShaderRecord::new(name, source, description);
        match self.thumbnail_png() {
            Ok(png) => record.with_thumbnail_png(&png),
            Err(e) => {
                tracing::warn!(error = %e, "shader record saved without thumbnail");
                record
            }
        }
    }
}
