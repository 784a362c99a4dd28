//! Video sinks and the external transcoder.
//!
//! Encoding and multiplexing are delegated to an `ffmpeg` executable: raw
//! frames are piped into a child process, and finished recordings are merged
//! or demuxed by running it to completion.

mod error;
mod transcoder;
mod writer;

pub use error::EncoderError;
pub use transcoder::Transcoder;
pub use writer::FfmpegVideoWriter;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoderConfig {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Target frames per second.
    pub fps: f64,
}

impl VideoEncoderConfig {
    /// Expected size of one RGB24 input frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Trait for video sinks accepting RGB24 frames in order.
pub trait VideoSink: Send {
    /// Append one frame.
    fn append(&mut self, frame: &[u8]) -> EncoderResult<()>;

    /// Flush and close. Appending after close fails.
    fn close(&mut self) -> EncoderResult<()>;

    /// Frames appended so far.
    fn frames_written(&self) -> u64;

    /// Sink name for diagnostics.
    fn name(&self) -> &'static str;
}
