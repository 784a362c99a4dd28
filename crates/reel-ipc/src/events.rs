//! Events sent from the engine to the shell.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state::{CaptureState, LoadOutcome, PlaybackState, StopReason};

/// Events that a player or recorder can send to the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Playback state has changed.
    PlaybackStateChanged {
        previous: PlaybackState,
        current: PlaybackState,
    },

    /// Playback stopped on its own or on request.
    PlaybackStopped { reason: StopReason },

    /// A frame was shown; drives position sliders.
    PositionChanged { frame: usize },

    /// Background frame loading progressed.
    LoadProgress {
        /// Frames stored so far.
        loaded: usize,

        /// Fraction of the source decoded (0.0 - 1.0).
        fraction: f32,
    },

    /// Background frame loading finished.
    LoadFinished { loaded: usize, outcome: LoadOutcome },

    /// Audio is unavailable for this session.
    AudioDisabled { message: String },

    /// Capture state has changed.
    CaptureStateChanged {
        previous: CaptureState,
        current: CaptureState,
    },

    /// A merge attempt finished.
    MergeFinished { output: PathBuf, success: bool },

    /// Error occurred.
    Error {
        /// Whether the session keeps running.
        recoverable: bool,

        /// Error message.
        message: String,
    },
}
