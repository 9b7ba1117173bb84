// ============================================================================
// GPU MODULE: fragment-shader effect pipeline for ShaderMask
// ============================================================================
//
// Architecture:
//   context.rs  : wgpu Device, Queue, adapter init
//   shaders.rs  : fixed WGSL: uniform contract prelude, vertex stage, passthrough
//   sanitize.rs : allowlisted textual fixes on incoming fragment text
//   program.rs  : naga front end + render pipeline creation
//   texture.rs  : image / mask / target texture wrappers
//   readback.rs : render target → CPU bytes, row-order handling
//   renderer.rs : top-level ShaderCanvas coordinator
// ============================================================================

pub mod context;
pub mod program;
pub mod readback;
pub mod renderer;
pub mod sanitize;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use program::ProgramState;
pub use readback::{OffscreenFrame, RowOrder};
pub use renderer::ShaderCanvas;
