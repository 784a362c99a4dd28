//! Typed shell<->engine messages for reel.
//!
//! This crate defines the commands a shell sends to a player or recorder,
//! the events the engine emits back, and the descriptors and configuration
//! types shared by every other crate.

mod commands;
mod events;
mod state;
mod types;

pub use commands::{PlayerCommand, RecorderCommand};
pub use events::MediaEvent;
pub use state::{CaptureState, LoadOutcome, PlaybackState, StopReason};
pub use types::{
    check_fps, AudioFormat, AudioSource, ClipRange, ConfigError, DisplaySize, PlayerConfig,
    RecorderConfig, ToolConfig, VideoSource, MIN_FPS,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (shell → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (engine → shell).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded player command channel.
pub fn player_command_channel() -> (Sender<PlayerCommand>, Receiver<PlayerCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded recorder command channel.
pub fn recorder_command_channel() -> (Sender<RecorderCommand>, Receiver<RecorderCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<MediaEvent>, Receiver<MediaEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
