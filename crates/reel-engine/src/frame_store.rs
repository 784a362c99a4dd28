//! Append-only store of decoded, display-sized frames.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use reel_capture::Frame;

/// Upper bound on the slots reserved up front from a reported frame count.
const MAX_RESERVED_FRAMES: usize = 4096;

/// Frames in load order. Written by one loader thread, read concurrently by
/// the display loop and the shell.
///
/// Indices below [`frame_count_loaded`](Self::frame_count_loaded) always
/// hold a frame, and a stored frame never changes.
pub struct FrameStore {
    slots: RwLock<Vec<Frame>>,
    loaded: AtomicUsize,
    expected: Option<usize>,
    complete: AtomicBool,
}

impl FrameStore {
    /// Create a store. A frame count reported by the source only sizes the
    /// initial reservation (capped) and serves as a length hint until loading
    /// completes.
    pub fn new(expected: Option<usize>) -> Self {
        let reserved = expected.unwrap_or(0).min(MAX_RESERVED_FRAMES);
        Self {
            slots: RwLock::new(Vec::with_capacity(reserved)),
            loaded: AtomicUsize::new(0),
            expected,
            complete: AtomicBool::new(false),
        }
    }

    /// Append a frame, tagging it with its index. Returns the index.
    pub fn push(&self, frame: Frame) -> usize {
        let mut slots = self.slots.write();
        let index = self.loaded.load(Ordering::Acquire);
        slots.push(frame.with_sequence(index as u64));
        self.loaded.store(index + 1, Ordering::Release);
        index
    }

    /// Number of frames stored so far. Never decreases while loading.
    pub fn frame_count_loaded(&self) -> usize {
        self.loaded.load(Ordering::Acquire)
    }

    /// The frame at `index`, or `None` when it is not loaded.
    pub fn frame_at(&self, index: usize) -> Option<Frame> {
        if index >= self.frame_count_loaded() {
            return None;
        }
        self.slots.read().get(index).cloned()
    }

    /// Highest loaded index.
    pub fn frontier(&self) -> Option<usize> {
        self.frame_count_loaded().checked_sub(1)
    }

    /// Frame count reported by the source, if any.
    pub fn expected_frames(&self) -> Option<usize> {
        self.expected
    }

    /// Best known length of the video in frames.
    pub fn total_frames(&self) -> usize {
        let loaded = self.frame_count_loaded();
        if self.is_complete() {
            return loaded;
        }
        self.expected.map_or(loaded, |expected| expected.max(loaded))
    }

    /// Index of the last frame of the video, once it is known.
    pub fn last_index(&self) -> Option<usize> {
        if self.is_complete() {
            self.frontier()
        } else {
            self.expected.and_then(|n| n.checked_sub(1))
        }
    }

    /// Mark loading as finished; no further frames will arrive.
    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(value: u8) -> Frame {
        Frame::new(Bytes::from(vec![value; 3]), 1, 1, 999)
    }

    #[test]
    fn test_push_and_read() {
        let store = FrameStore::new(Some(4));
        assert_eq!(store.frame_count_loaded(), 0);
        assert_eq!(store.frontier(), None);
        assert!(store.frame_at(0).is_none());

        assert_eq!(store.push(frame(7)), 0);
        assert_eq!(store.push(frame(8)), 1);

        assert_eq!(store.frame_count_loaded(), 2);
        assert_eq!(store.frontier(), Some(1));
        let second = store.frame_at(1).unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.data[0], 8);
        // Reported but unloaded.
        assert!(store.frame_at(3).is_none());
    }

    #[test]
    fn test_frame_at_is_stable() {
        let store = FrameStore::new(None);
        store.push(frame(1));
        let first = store.frame_at(0).unwrap();
        for value in 2..20 {
            store.push(frame(value));
        }
        assert_eq!(store.frame_at(0).unwrap(), first);
    }

    #[test]
    fn test_grows_past_expected_count() {
        let store = FrameStore::new(Some(1));
        store.push(frame(1));
        store.push(frame(2));
        assert_eq!(store.frame_count_loaded(), 2);
        assert_eq!(store.total_frames(), 2);
    }

    #[test]
    fn test_last_index() {
        let store = FrameStore::new(Some(10));
        store.push(frame(1));
        store.push(frame(2));
        assert_eq!(store.last_index(), Some(9));
        assert_eq!(store.total_frames(), 10);

        store.mark_complete();
        assert_eq!(store.last_index(), Some(1));
        assert_eq!(store.total_frames(), 2);

        let unknown = FrameStore::new(None);
        assert_eq!(unknown.last_index(), None);
    }

    #[test]
    fn test_absurd_frame_count_is_only_a_hint() {
        let store = FrameStore::new(Some(4_294_967_295_000));
        assert!(store.slots.read().capacity() <= MAX_RESERVED_FRAMES);
        assert_eq!(store.expected_frames(), Some(4_294_967_295_000));
        assert_eq!(store.total_frames(), 4_294_967_295_000);

        store.push(frame(1));
        store.push(frame(2));
        assert_eq!(store.frame_at(1).unwrap().data[0], 2);

        store.mark_complete();
        assert_eq!(store.total_frames(), 2);
        assert_eq!(store.last_index(), Some(1));
    }
}
