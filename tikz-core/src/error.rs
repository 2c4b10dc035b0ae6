use crate::generate::GenerationError;
use crate::render::{RenderError, RenderErrorKind};
use thiserror::Error;

/// Any recoverable failure of a pipeline job. These are reported to the user
/// and never end the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    Render(#[from] RenderError),
}

impl PipelineError {
    /// One-line label for a status bar.
    pub fn summary(&self) -> &'static str {
        match self {
            PipelineError::Generation(GenerationError::Authentication(_)) => "Authentication failed",
            PipelineError::Generation(GenerationError::RateLimited(_)) => "Rate limited",
            PipelineError::Generation(GenerationError::EmptyResponse) => "Empty response",
            PipelineError::Generation(_) => "Generation failed",
            PipelineError::Render(e) => match e.kind {
                RenderErrorKind::CompileFailure => "Compile error",
                RenderErrorKind::ToolchainMissing => "LaTeX not installed",
                RenderErrorKind::ConversionFailure => "Conversion failed",
                RenderErrorKind::Timeout => "Render timed out",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_by_kind() {
        let err: PipelineError =
            RenderError::new(RenderErrorKind::ToolchainMissing, "`pdflatex` was not found").into();
        assert_eq!(err.summary(), "LaTeX not installed");
        assert_eq!(
            err.to_string(),
            "LaTeX toolchain not found: `pdflatex` was not found"
        );

        let err: PipelineError = GenerationError::RateLimited("429".into()).into();
        assert_eq!(err.summary(), "Rate limited");
    }
}
