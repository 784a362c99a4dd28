//! Player and recorder state types.

use serde::{Deserialize, Serialize};

/// Playback state of a player. Pausing is stopping at the current position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl PlaybackState {
    /// Returns true if frames are being advanced.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
        }
    }
}

/// State of a capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    /// Devices closed.
    #[default]
    Idle,

    /// Devices open and previewing; `armed` when frames are being recorded.
    Capturing { armed: bool },
}

impl CaptureState {
    /// Returns true if the devices are open.
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// Returns true if recording is armed.
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Capturing { armed: true })
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Capturing { armed: false } => "Previewing",
            Self::Capturing { armed: true } => "Recording",
        }
    }
}

/// Reason playback or capture stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The shell asked to stop.
    UserRequested,

    /// The last frame of the video was shown.
    EndOfVideo,

    /// The end of the clip range was reached.
    ClipEnd,

    /// The capture device stopped delivering frames.
    DeviceLost { message: String },

    /// Writing to a sink failed.
    SinkFailed { message: String },
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Stopped by user".to_string(),
            Self::EndOfVideo => "End of video".to_string(),
            Self::ClipEnd => "End of clip".to_string(),
            Self::DeviceLost { message } => format!("Device lost: {message}"),
            Self::SinkFailed { message } => format!("Sink write failed: {message}"),
        }
    }
}

/// How background frame loading ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadOutcome {
    /// The source reached end of stream.
    Completed,

    /// `cancel_loading` was called.
    Cancelled,

    /// Decoding failed; frames loaded before the failure remain usable.
    DecodeError { message: String },
}
