//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur while decoding or capturing frames.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture source not found.
    #[error("Capture source not found: {0}")]
    SourceNotFound(String),

    /// The external decoder could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Stream metadata could not be read.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// The decoder produced unusable data.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Frame conversion error.
    #[error("Frame conversion error: {0}")]
    FrameConversion(String),

    /// I/O error on the decoder pipe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Errors that only spoil the current frame; the next read may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FrameConversion(_))
    }
}
