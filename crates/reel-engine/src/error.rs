//! Error types for the engine.

use thiserror::Error;

use reel_audio::AudioError;
use reel_capture::CaptureError;
use reel_encoder::EncoderError;
use reel_ipc::ConfigError;

/// Errors surfaced by players and recorders.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Device discovery found nothing to open.
    #[error("No capture device available")]
    DeviceUnavailable,

    /// The source reports unusable metadata.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Decoder or camera error.
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Microphone, audio track or wav error.
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Video sink or transcoder error.
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// A worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
