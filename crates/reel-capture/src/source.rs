//! The frame source abstraction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::frame::Frame;
use crate::CaptureResult;

/// Stream metadata of a frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Native frame width in pixels.
    pub width: u32,

    /// Native frame height in pixels.
    pub height: u32,

    /// Frames per second.
    pub fps: f64,

    /// Total frame count, when the container reports one.
    pub frame_count: Option<usize>,
}

/// Sequential producer of decoded frames (a file decoder or a camera).
pub trait FrameSource: Send {
    /// Read the next frame. `Ok(None)` marks end of stream.
    fn next_frame(&mut self) -> CaptureResult<Option<Frame>>;

    /// Stream metadata.
    fn info(&self) -> &SourceInfo;
}

/// Scripted outcome of one `next_frame` call on a [`MemorySource`].
enum Step {
    Frame(Frame),
    Fail(String, bool),
}

/// A frame source backed by frames held in memory.
///
/// Used for synthetic streams and wherever a real decoder is not wanted.
pub struct MemorySource {
    info: SourceInfo,
    steps: VecDeque<Step>,
    sequence: u64,
}

impl MemorySource {
    /// Create a source that yields `frames` then ends.
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        let info = SourceInfo {
            width,
            height,
            fps,
            frame_count: Some(frames.len()),
        };
        Self {
            info,
            steps: frames.into_iter().map(Step::Frame).collect(),
            sequence: 0,
        }
    }

    /// Queue a decode error after the frames already queued.
    pub fn then_decode_error(mut self, message: &str) -> Self {
        self.steps.push_back(Step::Fail(message.to_string(), false));
        self
    }

    /// Queue a transient (per-frame) error after the frames already queued.
    pub fn then_transient_error(mut self, message: &str) -> Self {
        self.steps.push_back(Step::Fail(message.to_string(), true));
        self
    }

    /// Queue more frames.
    pub fn then_frames(mut self, frames: Vec<Frame>) -> Self {
        self.steps.extend(frames.into_iter().map(Step::Frame));
        self
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => {
                let frame = frame.with_sequence(self.sequence);
                self.sequence += 1;
                Ok(Some(frame))
            }
            Some(Step::Fail(message, true)) => Err(CaptureError::FrameConversion(message)),
            Some(Step::Fail(message, false)) => Err(CaptureError::Decode(message)),
            None => Ok(None),
        }
    }

    fn info(&self) -> &SourceInfo {
        &self.info
    }
}
