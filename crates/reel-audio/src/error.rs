//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Audio device not found.
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Audio format not supported.
    #[error("Audio format not supported: {0}")]
    FormatNotSupported(String),

    /// Device lost during capture or playback.
    #[error("Audio device lost")]
    DeviceLost,

    /// The audio host or output device could not be used.
    #[error("Audio output unavailable: {0}")]
    Output(String),

    /// An external audio process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Wav encoding or decoding failed.
    #[error("Wav error: {0}")]
    Wav(#[from] hound::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
