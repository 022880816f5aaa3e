//! Pipeline error taxonomy.
//!
//! Per-frame errors (`InvalidInput`, `InferenceFailure`) are local: the frame is
//! skipped and the pipeline continues with the next one. `Configuration` is
//! raised while building the pipeline and is fatal at startup.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Malformed or empty frame, or a tensor whose shape does not match the model.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The inference backend failed; no partial results are produced for the frame.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// The category table or pipeline settings are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for errors that only affect the current frame.
    pub fn is_frame_local(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
