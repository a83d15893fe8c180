//! Parse and naming errors for model types.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown output style: {0}")]
    UnknownStyle(String),

    #[error("Unknown visual label: {0}")]
    UnknownVisual(String),

    #[error("Invalid checkpoint selector: {0}")]
    InvalidCheckpoint(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(String),

    #[error("No frame number in file stem: {0}")]
    NoFrameNumber(String),
}
