//! Error types for the encoder module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during encoding or transcoding.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The encoder process could not be started.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Writing to the encoder failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// The sink was already closed.
    #[error("Encoder not initialized")]
    NotInitialized,

    /// The transcoder executable does not exist.
    #[error("Transcoder not found: {}", .0.display())]
    TranscoderMissing(PathBuf),

    /// The transcoder exited unsuccessfully.
    #[error("Transcoder failed (status {status:?}): {stderr}")]
    TranscoderFailed { status: Option<i32>, stderr: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
