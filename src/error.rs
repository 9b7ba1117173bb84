//! Error types for the render pipeline and the session around it.

use std::fmt;

use thiserror::Error;

/// Where in the shader loader a source was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStage {
    /// WGSL parsing (syntax, unknown identifiers, type inference).
    Parse,
    /// Module validation (types, bindings, control flow).
    Validate,
    /// Entry-point lookup or pipeline creation on the device.
    Link,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompileStage::Parse => "parse",
            CompileStage::Validate => "validate",
            CompileStage::Link => "link",
        };
        f.write_str(name)
    }
}

/// Errors from the GPU render pipeline.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The fragment program was rejected.  `diagnostic` is the compiler's
    /// report, unmodified, so it can be handed to a repair step.
    #[error("shader rejected at {stage} stage:\n{diagnostic}")]
    ShaderCompile {
        stage: CompileStage,
        diagnostic: String,
    },

    /// No adapter or device could be created.
    #[error("graphics context unavailable: {0}")]
    UnsupportedContext(String),

    /// An operation needed the canvas size but no image is bound.
    #[error("no image is bound to the canvas")]
    NoImage,

    /// Zero-sized, or larger than the device's texture limit.
    #[error("image size {width}x{height} is outside the device range 1..={max}")]
    ImageSize { width: u32, height: u32, max: u32 },

    /// Mapping the staging buffer failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    /// The raw compiler diagnostic, if this is a compile failure.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderError::ShaderCompile { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    pub fn is_compile_error(&self) -> bool {
        matches!(self, RenderError::ShaderCompile { .. })
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_exposes_raw_diagnostic() {
        let err = RenderError::ShaderCompile {
            stage: CompileStage::Parse,
            diagnostic: "error: expected ';'".to_string(),
        };
        assert!(err.is_compile_error());
        assert_eq!(err.diagnostic(), Some("error: expected ';'"));
        assert!(err.to_string().contains("parse stage"));
    }

    #[test]
    fn non_compile_errors_have_no_diagnostic() {
        assert_eq!(RenderError::NoImage.diagnostic(), None);
        assert!(!RenderError::UnsupportedContext("none".into()).is_compile_error());
    }
}
