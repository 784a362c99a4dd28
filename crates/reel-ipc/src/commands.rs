//! Commands sent from the shell to the engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::ClipRange;

/// Commands that drive a video player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Start playback from the current position.
    Play,

    /// Stop playback, keeping the current position.
    Pause,

    /// Play if paused, pause if playing.
    Toggle,

    /// Skip forward by the configured skip size.
    SkipForward,

    /// Skip backward by the configured skip size.
    SkipBackward,

    /// Seek to a frame index.
    LoadFrame(usize),

    /// Restrict playback to a frame window, or clear the restriction.
    SetClip(Option<ClipRange>),

    /// Stop decoding further frames.
    CancelLoading,

    /// Stop everything and leave the command loop.
    Shutdown,
}

/// Commands that drive a camera/microphone recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderCommand {
    /// Open the devices and start live preview.
    StartCapture,

    /// Arm recording, optionally into a new output file.
    StartRecording { output: Option<PathBuf> },

    /// Disarm recording; preview keeps running.
    StopRecording,

    /// Stop capture and close all sinks.
    StopCapture,

    /// Multiplex the recorded video and audio into one file.
    Merge {
        output: PathBuf,
        delete_sources: bool,
    },

    /// Stop everything and leave the command loop.
    Shutdown,
}
