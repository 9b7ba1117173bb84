// ============================================================================
// SHADER CANVAS: image + mask + fragment program → canvas target
// ============================================================================
//
// Owns every GPU object the effect pipeline needs.  All methods run on the
// caller's thread; `&mut self` serialises them.  The offscreen path builds
// its own program and target and never touches `active` or `target`.

use image::RgbaImage;

use super::context::GpuContext;
use super::program::{self, CompiledProgram, ParamsUniform, ProgramLayout};
use super::readback::{self, OffscreenFrame, RowOrder};
use super::shaders::PASSTHROUGH_FRAGMENT;
use super::texture::{CanvasTexture, TARGET_FORMAT};
use crate::animation::{FrameScheduler, RenderParams};
use crate::canvas::{MaskBuffer, MaskObserver};
use crate::error::{RenderError, RenderResult};
use crate::io;

/// Which program drives the canvas.
enum ActiveProgram {
    None,
    Passthrough,
    Custom(CompiledProgram),
}

pub struct ShaderCanvas {
    ctx: GpuContext,
    layout: ProgramLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    passthrough: CompiledProgram,

    image: Option<CanvasTexture>,
    mask: Option<CanvasTexture>,
    target: Option<CanvasTexture>,
    active: ActiveProgram,

    params: RenderParams,
    frames_rendered: u64,
}

impl ShaderCanvas {
    /// Create a GPU context and an empty canvas.
    pub fn new(preferred_gpu: &str) -> RenderResult<Self> {
        Self::with_context(GpuContext::new(preferred_gpu)?)
    }

    pub fn with_context(ctx: GpuContext) -> RenderResult<Self> {
        let layout = ProgramLayout::new(&ctx.device);

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shader_canvas_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shader_canvas_params"),
            size: std::mem::size_of::<ParamsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let passthrough = program::compile(&ctx, &layout, TARGET_FORMAT, PASSTHROUGH_FRAGMENT)?;

        Ok(Self {
            ctx,
            layout,
            sampler,
            uniform_buffer,
            passthrough,
            image: None,
            mask: None,
            target: None,
            active: ActiveProgram::None,
            params: RenderParams::default(),
            frames_rendered: 0,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    // ========================================================================
    // INPUTS
    // ========================================================================

    /// Bind a new source image and size the canvas to it.  A mask of another
    /// size is swapped for an all-selected one until the next `set_mask`.
    pub fn set_image(&mut self, image: &RgbaImage) -> RenderResult<()> {
        let (width, height) = image.dimensions();
        if !self.ctx.supports_size(width, height) {
            return Err(RenderError::ImageSize {
                width,
                height,
                max: self.ctx.max_texture_dim,
            });
        }
        let device = &self.ctx.device;
        self.image = Some(CanvasTexture::from_image(device, &self.ctx.queue, image));

        if self.target.as_ref().map(CanvasTexture::dimensions) != Some((width, height)) {
            self.target = Some(CanvasTexture::render_target(device, "canvas_target", width, height));
        }
        if self.mask.as_ref().map(CanvasTexture::dimensions) != Some((width, height)) {
            let full = MaskBuffer::new(width, height);
            self.mask = Some(CanvasTexture::from_mask(device, &self.ctx.queue, &full));
        }
        tracing::info!(width, height, "image bound to canvas");
        Ok(())
    }

    /// Drop image, mask and canvas.  Rendering becomes a no-op.
    pub fn clear_image(&mut self) {
        self.image = None;
        self.mask = None;
        self.target = None;
        tracing::debug!("canvas cleared");
    }

    /// Re-upload the whole mask.  Resampled if it does not match the canvas.
    pub fn set_mask(&mut self, mask: &MaskBuffer) {
        if mask.width() == 0 || mask.height() == 0 {
            return;
        }
        let resampled;
        let mask = match self.canvas_size() {
            Some((w, h)) if mask.dimensions() != (w, h) => {
                tracing::warn!(mask = ?mask.dimensions(), canvas = ?(w, h), "mask size differs from canvas, resampling");
                resampled = mask.resized(w, h);
                &resampled
            }
            _ => mask,
        };
        match &self.mask {
            Some(tex) if tex.dimensions() == mask.dimensions() => tex.upload_full(&self.ctx.queue, mask.as_raw()),
            _ => self.mask = Some(CanvasTexture::from_mask(&self.ctx.device, &self.ctx.queue, mask)),
        }
    }

    /// Compile and activate a fragment program.  On failure the previous
    /// program stays active and the canvas keeps its last frame.
    pub fn set_shader(&mut self, source: &str) -> RenderResult<()> {
        match program::compile(&self.ctx, &self.layout, TARGET_FORMAT, source) {
            Ok(compiled) => {
                tracing::info!(rewrites = compiled.rewrites.len(), "shader activated");
                self.active = ActiveProgram::Custom(compiled);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "shader rejected, keeping previous program");
                Err(e)
            }
        }
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    pub fn set_intensity(&mut self, value: f32) {
        self.params.set_intensity(value);
    }

    pub fn intensity(&self) -> f32 {
        self.params.intensity()
    }

    pub fn start_animating(&mut self) {
        self.params.start_animating();
    }

    pub fn stop_animating(&mut self) {
        self.params.stop_animating();
    }

    pub fn is_animating(&self) -> bool {
        self.params.is_animating()
    }

    pub fn has_active_program(&self) -> bool {
        !matches!(self.active, ActiveProgram::None)
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(CanvasTexture::dimensions)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    fn active_program(&self) -> Option<&CompiledProgram> {
        match &self.active {
            ActiveProgram::None => None,
            ActiveProgram::Passthrough => Some(&self.passthrough),
            ActiveProgram::Custom(p) => Some(p),
        }
    }

    fn current_uniforms(&self, width: u32, height: u32) -> ParamsUniform {
        ParamsUniform {
            resolution: [width as f32, height as f32],
            time: self.params.elapsed(),
            intensity: self.params.intensity(),
        }
    }

    /// Encode and submit one full-screen draw of `program` into `target`.
    fn draw(&self, program: &CompiledProgram, target: &CanvasTexture) -> RenderResult<()> {
        let (Some(image), Some(mask)) = (&self.image, &self.mask) else {
            return Err(RenderError::NoImage);
        };
        let device = &self.ctx.device;

        let uniforms = self.current_uniforms(target.width, target.height);
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shader_canvas_bg"),
            layout: &self.layout.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&image.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&mask.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shader_canvas_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shader_canvas_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.ctx.submit_one(encoder);
        Ok(())
    }

    /// Draw the active program into the canvas.  Returns `false` (and draws
    /// nothing) when no image or no program is bound.
    pub fn render(&mut self) -> bool {
        let (Some(program), Some(target)) = (self.active_program(), self.target.as_ref()) else {
            return false;
        };
        match self.draw(program, target) {
            Ok(()) => {
                self.frames_rendered += 1;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "render skipped");
                false
            }
        }
    }

    /// Make the identity program active and render.  The mask is untouched.
    pub fn render_passthrough(&mut self) -> bool {
        self.active = ActiveProgram::Passthrough;
        self.render()
    }

    /// One animation step: render, then ask the host for another frame.
    /// Does nothing once animation is stopped.
    pub fn tick(&mut self, scheduler: &mut impl FrameScheduler) -> bool {
        if !self.params.is_animating() {
            return false;
        }
        let drawn = self.render();
        if self.params.is_animating() {
            scheduler.request_frame();
        }
        drawn
    }

    /// Compile `source` and render one frame into a private target of canvas
    /// size, then read it back.  The active program and the canvas are left
    /// exactly as they were, whether this succeeds or fails.
    pub fn render_offscreen(&self, source: &str) -> RenderResult<OffscreenFrame> {
        let (width, height) = self.canvas_size().ok_or(RenderError::NoImage)?;
        let program = program::compile(&self.ctx, &self.layout, TARGET_FORMAT, source)?;
        let target = CanvasTexture::render_target(&self.ctx.device, "offscreen_target", width, height);

        self.draw(&program, &target)?;
        let pixels = readback::readback_texture(&self.ctx, &target.texture, width, height)?;
        tracing::debug!(width, height, "offscreen frame read back");

        // `program` and `target` drop here, releasing their GPU objects.
        Ok(OffscreenFrame {
            pixels,
            width,
            height,
            row_order: RowOrder::TopDown,
        })
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Fresh render of the canvas, read back as an image.  With no active
    /// program the source image is exported through the passthrough.
    pub fn export_image(&mut self) -> RenderResult<RgbaImage> {
        let (width, height) = self.canvas_size().ok_or(RenderError::NoImage)?;
        let target = self.target.as_ref().ok_or(RenderError::NoImage)?;
        let program = self.active_program().unwrap_or(&self.passthrough);
        self.draw(program, target)?;
        let pixels = readback::readback_texture(&self.ctx, &target.texture, width, height)?;
        self.frames_rendered += 1;

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("readback size mismatch".to_string()))
    }

    pub fn export_png(&mut self) -> RenderResult<Vec<u8>> {
        let image = self.export_image()?;
        Ok(io::encode_png(&image)?)
    }

    pub fn export_data_url(&mut self) -> RenderResult<String> {
        Ok(io::to_data_url(&self.export_png()?))
    }

    /// PNG of the canvas scaled to fit a `max_dim` box.
    pub fn thumbnail_png(&mut self, max_dim: u32) -> RenderResult<Vec<u8>> {
        let image = self.export_image()?;
        Ok(io::encode_png(&io::thumbnail(&image, max_dim))?)
    }
}

impl MaskObserver for ShaderCanvas {
    fn on_mask_changed(&mut self, mask: &MaskBuffer) {
        self.set_mask(mask);
    }
}
