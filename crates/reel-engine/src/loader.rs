//! Background decoding into a [`FrameStore`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use reel_capture::{Frame, FrameSource};
use reel_ipc::{DisplaySize, LoadOutcome, MediaEvent};

use crate::error::EngineError;
use crate::events::EventSink;
use crate::frame_store::FrameStore;
use crate::{EngineResult, PROGRESS_INTERVAL};

/// Called with the first stored frame.
pub(crate) type FirstFrameHook = Box<dyn FnOnce(&Frame) + Send>;

/// Decodes a source to the end on its own thread, appending display-sized
/// frames to a shared store.
///
/// A frame identical to the one decoded just before it is not stored.
pub struct FrameLoader {
    store: Arc<FrameStore>,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<LoadOutcome>>>,
}

impl FrameLoader {
    #[instrument(name = "frame_loader_spawn", skip_all)]
    pub(crate) fn spawn(
        source: Box<dyn FrameSource>,
        store: Arc<FrameStore>,
        size: DisplaySize,
        events: EventSink,
        on_first_frame: Option<FirstFrameHook>,
    ) -> EngineResult<Self> {
        let cancel = Arc::new(AtomicBool::new(false));

        let handle = {
            let store = Arc::clone(&store);
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name("frame-loader".to_string())
                .spawn(move || load_loop(source, &store, size, &cancel, &events, on_first_frame))
                .map_err(EngineError::Spawn)?
        };

        Ok(Self {
            store,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    /// Stop decoding after the frame in flight. Loaded frames are kept.
    pub fn cancel_loading(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.store.is_complete()
    }

    /// Wait for the loader thread. Returns `None` if it was already joined.
    pub fn join(&self) -> Option<LoadOutcome> {
        let handle = self.handle.lock().take()?;
        match handle.join() {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                warn!("Frame loader panicked");
                self.store.mark_complete();
                None
            }
        }
    }
}

impl Drop for FrameLoader {
    fn drop(&mut self) {
        self.cancel_loading();
        self.join();
    }
}

fn load_loop(
    mut source: Box<dyn FrameSource>,
    store: &FrameStore,
    size: DisplaySize,
    cancel: &AtomicBool,
    events: &EventSink,
    mut on_first_frame: Option<FirstFrameHook>,
) -> LoadOutcome {
    let expected = store.expected_frames();
    let mut previous: Option<Frame> = None;
    let mut decoded = 0usize;

    debug!(?expected, "Frame loader starting");

    let outcome = loop {
        if cancel.load(Ordering::SeqCst) {
            break LoadOutcome::Cancelled;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break LoadOutcome::Completed,
            Err(e) => {
                warn!(decoded, "Decoding stopped: {}", e);
                break LoadOutcome::DecodeError {
                    message: e.to_string(),
                };
            }
        };
        decoded += 1;

        if previous.as_ref().is_some_and(|p| p.same_pixels(&frame)) {
            continue;
        }

        let sized = match frame.resized(size) {
            Ok(sized) => sized,
            Err(e) => {
                warn!(decoded, "Resize failed: {}", e);
                break LoadOutcome::DecodeError {
                    message: e.to_string(),
                };
            }
        };
        previous = Some(frame);

        if cancel.load(Ordering::SeqCst) {
            break LoadOutcome::Cancelled;
        }

        let index = store.push(sized);
        if index == 0 {
            if let (Some(hook), Some(first)) = (on_first_frame.take(), store.frame_at(0)) {
                hook(&first);
            }
        }

        let loaded = index + 1;
        if loaded % PROGRESS_INTERVAL == 0 {
            events.send(MediaEvent::LoadProgress {
                loaded,
                fraction: progress(decoded, expected),
            });
        }
    };

    store.mark_complete();
    let loaded = store.frame_count_loaded();

    info!(loaded, decoded, ?outcome, "Frame loading finished");

    let fraction = match outcome {
        LoadOutcome::Completed => 1.0,
        _ => progress(decoded, expected),
    };
    events.send(MediaEvent::LoadProgress { loaded, fraction });
    events.send(MediaEvent::LoadFinished {
        loaded,
        outcome: outcome.clone(),
    });

    outcome
}

fn progress(decoded: usize, expected: Option<usize>) -> f32 {
    match expected {
        Some(total) if total > 0 => (decoded as f32 / total as f32).min(1.0),
        _ => 0.0,
    }
}
