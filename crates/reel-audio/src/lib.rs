//! Audio capture, caching and output.
//!
//! Microphones are discovered through the system audio host and read through
//! an external `ffmpeg` process; playback goes to the default output device
//! and wav files are read and written in-process.

mod capture;
mod device;
mod error;
mod output;
mod sink;
mod track;

pub use capture::{AudioChunk, AudioInput, MicrophoneCapture};
pub use device::list_audio_sources;
pub use error::AudioError;
pub use output::{AudioOutput, RodioAudioOutput};
pub use sink::WavSink;
pub use track::{AudioTrackCache, AudioTrackLoader};

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Bits per sample of every PCM stream handled here.
pub const BITS_PER_SAMPLE: u16 = 16;
