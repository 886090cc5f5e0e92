//! Error types for the face pipeline

use thiserror::Error;

/// Result type alias for the pipeline crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while running the pipeline.
///
/// Each variant maps onto a process exit code; the tracking core itself
/// never produces errors (numeric edge cases are absorbed there), so
/// everything here originates from configuration, I/O or the adaptors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("image load failed: {0}")]
    ImageLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("no input provided")]
    NoInput,

    #[error("self-test failed: {0}")]
    SelfTest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgs(_) => 1,
            Self::ModelNotFound(_) => 2,
            Self::ImageLoad(_) | Self::Image(_) => 3,
            Self::Inference(_) | Self::Json(_) | Self::Io(_) => 4,
            Self::NoInput => 5,
            Self::SelfTest(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(PipelineError::InvalidArgs("x".into()).exit_code(), 1);
        assert_eq!(PipelineError::ModelNotFound("m".into()).exit_code(), 2);
        assert_eq!(PipelineError::ImageLoad("i".into()).exit_code(), 3);
        assert_eq!(PipelineError::Inference("e".into()).exit_code(), 4);
        assert_eq!(PipelineError::NoInput.exit_code(), 5);
        assert_eq!(PipelineError::SelfTest("t".into()).exit_code(), 6);
    }
}
