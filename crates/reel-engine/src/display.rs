//! Seams to the shell's display surface and play/pause indicator.

use reel_capture::Frame;

/// Where frames are shown.
///
/// Called from worker threads; implementations hand the frame over to their
/// UI thread.
pub trait DisplayTarget: Send + Sync {
    /// Show a display-sized frame.
    fn render(&self, frame: &Frame);

    /// Returns false when the surface is hidden; rendering is skipped.
    fn is_visible(&self) -> bool {
        true
    }
}

/// The shell's play/pause indicator.
pub trait PlayControl: Send + Sync {
    fn set_playing(&self, playing: bool);
}
