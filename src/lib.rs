//! ShaderMask : paint or generate a selection mask over an image and apply a
//! GPU fragment-shader effect through it.
//!
//! The pieces, leaves first:
//! * [`canvas`] : the mask buffer and the editor that owns it
//! * [`ops`] : brush, quick select, polygon and raster selection algorithms
//! * [`compositor`] : the `mix(original, effect, mask * intensity)` reference
//! * [`gpu`] : wgpu context, shader loader and the [`gpu::ShaderCanvas`]
//! * [`session`] : one image + mask + canvas, the usual entry point

pub mod animation;
pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod gpu;
pub mod io;
pub mod logger;
pub mod ops;
pub mod presets;
pub mod session;

pub use canvas::{MaskBuffer, MaskEditor, MaskObserver};
pub use config::Settings;
pub use error::{CompileStage, RenderError, RenderResult};
pub use gpu::{OffscreenFrame, ShaderCanvas};
pub use session::Session;
