//! Single-slot "latest frame" cell shared by a capture loop and a display loop.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::frame::Frame;

/// Holds only the newest published frame. Publishing overwrites; a reader
/// that falls behind skips straight to the newest frame.
#[derive(Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Frame>>,
    version: AtomicU64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame.
    pub fn publish(&self, frame: Frame) {
        *self.slot.lock() = Some(frame);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Number of frames published so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The newest frame, if one was published after version `seen`.
    pub fn newer_than(&self, seen: u64) -> Option<(u64, Frame)> {
        let version = self.version();
        if version == seen {
            return None;
        }
        self.slot.lock().clone().map(|frame| (version, frame))
    }

    /// Drop the stored frame.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame::new(Bytes::from_static(&[0, 0, 0]), 1, 1, sequence)
    }

    #[test]
    fn test_latest_frame_overwrites() {
        let slot = LatestFrame::new();
        assert!(slot.newer_than(0).is_none());

        slot.publish(frame(1));
        slot.publish(frame(2));

        let (version, latest) = slot.newer_than(0).unwrap();
        assert_eq!(version, 2);
        assert_eq!(latest.sequence, 2);

        // Nothing new since the last read.
        assert!(slot.newer_than(version).is_none());

        slot.publish(frame(3));
        assert_eq!(slot.newer_than(version).unwrap().1.sequence, 3);
    }
}
