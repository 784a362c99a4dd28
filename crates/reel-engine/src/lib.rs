//! Core of reel: a buffered frame-streaming player and a camera/microphone
//! recorder.
//!
//! Decoding, loading and capture run on dedicated worker threads; the shell
//! drives a [`VideoPlayer`] or [`VideoRecorder`] through plain method calls
//! or through the command loops in this crate, and receives
//! [`MediaEvent`](reel_ipc::MediaEvent)s back.

mod clock;
mod display;
mod error;
mod events;
mod frame_store;
mod lifecycle;
mod loader;
mod player;
mod recorder;
mod serve;
mod ticker;

pub use clock::{next_position, resync_chunk_index, skip_frames, start_position, Advance};
pub use display::{DisplayTarget, PlayControl};
pub use error::EngineError;
pub use frame_store::FrameStore;
pub use lifecycle::{Lifecycle, StopSignal};
pub use loader::FrameLoader;
pub use player::{Attachments, PlayerAudio, VideoPlayer};
pub use recorder::{first_available, FfmpegBackend, MediaBackend, VideoRecorder};
pub use serve::{serve_player, serve_recorder};
pub use ticker::Ticker;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Frames between two load progress reports.
pub const PROGRESS_INTERVAL: usize = 10;
