// ============================================================================
// GPU SHADERS: fixed WGSL kept inline; user fragments are appended to PRELUDE
// ============================================================================

// ============================================================================
// PRELUDE: uniform contract, vertex stage, helpers
// ============================================================================
//
// Every fragment program is compiled as `PRELUDE + fragment`.  The prelude owns
// the bindings and the vertex stage so user text only ever supplies `fs_main`.
//
// The quad is generated from `vertex_index`; no vertex buffer is bound.  UVs
// have their origin at the top-left of the image, matching readback order.
//
// The helpers sample with an explicit LOD so they are legal inside
// non-uniform control flow (branches on `in.uv` are common in effects).
pub const PRELUDE: &str = r#"
struct Params {
    resolution: vec2<f32>,   // canvas size in pixels
    time: f32,               // seconds since animation start, 0 when idle
    intensity: f32,          // effect strength, 0..1
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var u_image: texture_2d<f32>;
@group(0) @binding(2) var u_mask: texture_2d<f32>;
@group(0) @binding(3) var u_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );
    let uv = corners[vi];

    var out: VertexOutput;
    // Y flipped: uv (0,0) is the top-left pixel.
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

fn sample_image(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(u_image, u_sampler, uv, 0.0);
}

fn sample_mask(uv: vec2<f32>) -> f32 {
    return textureSampleLevel(u_mask, u_sampler, uv, 0.0).r;
}

fn apply_mask(original: vec4<f32>, effected: vec4<f32>, uv: vec2<f32>) -> vec4<f32> {
    return mix(original, effected, sample_mask(uv) * u.intensity);
}
"#;

/// Entry point every fragment program must define.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Entry point of the prelude's vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";

/// Identity program: shows the source image untouched.
pub const PASSTHROUGH_FRAGMENT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return sample_image(in.uv);
}
"#;

/// Number of lines the prelude adds before user text.  Used to translate
/// diagnostic line numbers back to the fragment.
pub fn prelude_line_count() -> usize {
    PRELUDE.lines().count()
}
