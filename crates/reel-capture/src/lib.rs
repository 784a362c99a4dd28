//! Frame sources for reel.
//!
//! This crate decodes video files and reads cameras through an external
//! `ffmpeg` process, and provides the frame type and the single-slot cell
//! used to hand the newest frame from a capture loop to a display loop.

mod device;
mod error;
mod ffmpeg;
mod frame;
mod slot;
mod source;

pub use device::list_video_sources;
pub use error::CaptureError;
pub use ffmpeg::{probe_video, FfmpegReader};
pub use frame::Frame;
pub use slot::LatestFrame;
pub use source::{FrameSource, MemorySource, SourceInfo};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Highest camera index probed during discovery.
pub const MAX_VIDEO_DEVICES: u32 = 10;
