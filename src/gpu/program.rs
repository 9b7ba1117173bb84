// ============================================================================
// SHADER PROGRAM LOADER: sanitise, assemble, validate, build the pipeline
// ============================================================================

use std::num::NonZeroU64;

use super::context::GpuContext;
use super::sanitize::{coerce_integer_builtins, sanitize, Rewrite};
use super::shaders::{self, FRAGMENT_ENTRY, PRELUDE, VERTEX_ENTRY};
use crate::error::{CompileStage, RenderError, RenderResult};

/// Uniform block matching `struct Params` in the prelude.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParamsUniform {
    pub resolution: [f32; 2],
    pub time: f32,
    pub intensity: f32,
}

/// Per-source status for callers that track several programs (a preset
/// list, a generator's retry loop).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ProgramState {
    /// Text received, not compiled yet.
    #[default]
    Pending,
    Compiled,
    Rejected { diagnostic: String },
}

impl ProgramState {
    pub fn from_result<T>(result: &RenderResult<T>) -> Self {
        match result {
            Ok(_) => ProgramState::Compiled,
            Err(e) => ProgramState::Rejected {
                diagnostic: e.diagnostic().map(str::to_string).unwrap_or_else(|| e.to_string()),
            },
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, ProgramState::Compiled)
    }
}

/// Prelude + fragment, as handed to the compiler.
pub fn assemble(fragment: &str) -> String {
    let mut out = String::with_capacity(PRELUDE.len() + fragment.len() + 1);
    out.push_str(PRELUDE);
    out.push('\n');
    out.push_str(fragment);
    out
}

/// Output of the CPU-side front end: sanitised text, the assembled module
/// source, and what the sanitiser changed.
#[derive(Debug)]
pub struct CheckedSource {
    pub fragment: String,
    pub assembled: String,
    pub rewrites: Vec<Rewrite>,
}

fn rejected(stage: CompileStage, diagnostic: String) -> RenderError {
    tracing::debug!(%stage, prelude_lines = shaders::prelude_line_count(), "shader rejected");
    RenderError::ShaderCompile { stage, diagnostic }
}

/// Parse and validate one fragment with naga, returning the assembled module
/// source.  Errors carry the raw diagnostic.
fn front_end(fragment: &str) -> RenderResult<String> {
    let assembled = assemble(fragment);

    let module = naga::front::wgsl::parse_str(&assembled)
        .map_err(|e| rejected(CompileStage::Parse, e.emit_to_string(&assembled)))?;

    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
        .validate(&module)
        .map_err(|e| rejected(CompileStage::Validate, e.emit_to_string(&assembled)))?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.name == FRAGMENT_ENTRY && ep.stage == naga::ShaderStage::Fragment);
    if !has_entry {
        return Err(rejected(
            CompileStage::Link,
            format!("error: no `@fragment fn {FRAGMENT_ENTRY}(in: VertexOutput) -> @location(0) vec4<f32>` entry point"),
        ));
    }
    Ok(assembled)
}

/// Sanitise, assemble, parse and validate with naga, and check for the
/// `fs_main` fragment entry point.  Needs no device.
///
/// A source that fails to parse or validate gets one retry with every
/// integer loop index in abs/min/max/clamp/sign coerced to `f32`.  If the
/// retry fails too, the first diagnostic is returned.
pub fn check_source(source: &str) -> RenderResult<CheckedSource> {
    let sanitized = sanitize(source);
    let mut rewrites = sanitized.rewrites;
    let mut fragment = sanitized.source;

    let assembled = match front_end(&fragment) {
        Ok(assembled) => assembled,
        Err(err @ RenderError::ShaderCompile { stage: CompileStage::Parse | CompileStage::Validate, .. }) => {
            let Some((coerced, rewrite)) = coerce_integer_builtins(&fragment) else {
                return Err(err);
            };
            match front_end(&coerced) {
                Ok(assembled) => {
                    fragment = coerced;
                    rewrites.push(rewrite);
                    assembled
                }
                Err(_) => return Err(err),
            }
        }
        Err(err) => return Err(err),
    };
    for rewrite in &rewrites {
        tracing::debug!(%rewrite, "shader source rewritten");
    }

    Ok(CheckedSource { fragment, assembled, rewrites })
}

// ============================================================================
// PIPELINE LAYOUT: one per canvas, shared by every program
// ============================================================================

pub struct ProgramLayout {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl ProgramLayout {
    pub fn new(device: &wgpu::Device) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shader_canvas_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<ParamsUniform>() as u64),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader_canvas_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            bind_group_layout,
            pipeline_layout,
        }
    }
}

// ============================================================================
// COMPILED PROGRAM
// ============================================================================

/// A linked render pipeline.  Dropping it releases the GPU objects.
pub struct CompiledProgram {
    pub pipeline: wgpu::RenderPipeline,
    /// The fragment text after sanitation.
    pub fragment: String,
    pub rewrites: Vec<Rewrite>,
}

impl std::fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("fragment_len", &self.fragment.len())
            .field("rewrites", &self.rewrites)
            .finish()
    }
}

/// Full compile: front end, then module and pipeline creation inside a
/// validation error scope so device-side rejections come back as `Link`
/// errors instead of panicking in the error handler.
pub fn compile(
    ctx: &GpuContext,
    layout: &ProgramLayout,
    format: wgpu::TextureFormat,
    source: &str,
) -> RenderResult<CompiledProgram> {
    let checked = check_source(source)?;
    let device = &ctx.device;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shader_canvas_program"),
        source: wgpu::ShaderSource::Wgsl(checked.assembled.as_str().into()),
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shader_canvas_pipeline"),
        layout: Some(&layout.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: VERTEX_ENTRY,
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: FRAGMENT_ENTRY,
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(rejected(CompileStage::Link, err.to_string()));
    }

    Ok(CompiledProgram {
        pipeline,
        fragment: checked.fragment,
        rewrites: checked.rewrites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_of(err: &RenderError) -> Option<CompileStage> {
        match err {
            RenderError::ShaderCompile { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    #[test]
    fn uniform_block_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<ParamsUniform>(), 16);
    }

    #[test]
    fn passthrough_checks_clean() {
        let checked = check_source(shaders::PASSTHROUGH_FRAGMENT).unwrap();
        assert!(checked.rewrites.is_empty());
        assert!(checked.assembled.starts_with(PRELUDE));
    }

    #[test]
    fn syntax_error_is_a_parse_failure() {
        let err = check_source("@fragment fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> { return }").unwrap_err();
        assert_eq!(stage_of(&err), Some(CompileStage::Parse));
        assert!(!err.diagnostic().unwrap().is_empty());
    }

    #[test]
    fn unknown_identifier_is_reported_verbatim() {
        let err = check_source(
            "@fragment fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> { return no_such_thing(in.uv); }",
        )
        .unwrap_err();
        assert!(err.is_compile_error());
        assert!(err.diagnostic().unwrap().contains("no_such_thing"));
    }

    #[test]
    fn missing_entry_point_is_a_link_failure() {
        let err = check_source("@fragment fn main(in: VertexOutput) -> @location(0) vec4<f32> { return sample_image(in.uv); }")
            .unwrap_err();
        assert_eq!(stage_of(&err), Some(CompileStage::Link));
    }

    #[test]
    fn glsl_casts_compile_after_sanitation() {
        let checked = check_source(
            "@fragment fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> { return vec4<f32>(float(1), 0.0, 0.0, 1.0); }",
        )
        .unwrap();
        assert_eq!(checked.rewrites, vec![Rewrite::ScalarCast { count: 1 }]);
    }

    #[test]
    fn integer_loop_index_compiles_after_coercion() {
        let src = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var acc = 0.0;
    for (var i = 0; i < 4; i++) {
        acc += abs(i - 2) * 0.25;
    }
    return apply_mask(sample_image(in.uv), vec4<f32>(acc, 0.0, 0.0, 1.0), in.uv);
}
"#;
        let checked = check_source(src).unwrap();
        assert_eq!(checked.rewrites, vec![Rewrite::IntegerCoercion { count: 1 }]);
    }

    #[test]
    fn integer_min_as_index_compiles_untouched() {
        let src = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var w = array<f32, 4>(0.1, 0.2, 0.3, 0.4);
    var acc = 0.0;
    for (var i = 0; i < 6; i++) {
        acc += w[min(i, 3)];
    }
    return apply_mask(sample_image(in.uv), vec4<f32>(acc, acc, acc, 1.0), in.uv);
}
"#;
        let checked = check_source(src).unwrap();
        assert!(checked.rewrites.is_empty(), "{:?}", checked.rewrites);
        assert!(checked.fragment.contains("w[min(i, 3)]"));
    }

    #[test]
    fn failed_retry_keeps_first_diagnostic() {
        let src = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var acc = 0.0;
    for (var i = 0; i < 4; i++) {
        acc += abs(i) * missing_value;
    }
    return vec4<f32>(acc, 0.0, 0.0, 1.0);
}
"#;
        let err = check_source(src).unwrap_err();
        assert!(err.diagnostic().unwrap().contains("missing_value"));
    }

    #[test]
    fn fenced_source_compiles() {
        let src = format!("```wgsl\n{}\n```", shaders::PASSTHROUGH_FRAGMENT);
        let checked = check_source(&src).unwrap();
        assert_eq!(checked.rewrites, vec![Rewrite::StrippedCodeFence]);
    }

    #[test]
    fn state_tracks_result() {
        assert_eq!(ProgramState::default(), ProgramState::Pending);
        let ok: RenderResult<()> = Ok(());
        assert!(ProgramState::from_result(&ok).is_compiled());
        let bad: RenderResult<()> = Err(RenderError::ShaderCompile {
            stage: CompileStage::Parse,
            diagnostic: "boom".into(),
        });
        assert_eq!(ProgramState::from_result(&bad), ProgramState::Rejected { diagnostic: "boom".into() });
    }
}
