//! Headless stand-ins for a display surface and a play button.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, trace, warn};

use reel_capture::Frame;
use reel_engine::{DisplayTarget, PlayControl};
use reel_ipc::MediaEvent;

/// Counts rendered frames and logs a sample of them.
#[derive(Default)]
pub struct LoggingDisplay {
    rendered: AtomicU64,
}

impl LoggingDisplay {
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

impl DisplayTarget for LoggingDisplay {
    fn render(&self, frame: &Frame) {
        let rendered = self.rendered.fetch_add(1, Ordering::Relaxed) + 1;
        if rendered == 1 || rendered % 100 == 0 {
            debug!(
                frame = frame.sequence,
                width = frame.width,
                height = frame.height,
                rendered,
                "Frame rendered"
            );
        }
    }
}

/// Tracks the play indicator so the shell can tell when playback ended.
#[derive(Default)]
pub struct LoggingControl {
    playing: AtomicBool,
    starts: AtomicUsize,
}

impl LoggingControl {
    /// True once playback has started and stopped again.
    pub fn has_finished(&self) -> bool {
        self.starts.load(Ordering::SeqCst) > 0 && !self.playing.load(Ordering::SeqCst)
    }
}

impl PlayControl for LoggingControl {
    fn set_playing(&self, playing: bool) {
        debug!(playing, "Play control");
        if playing {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        self.playing.store(playing, Ordering::SeqCst);
    }
}

/// Log engine events until every sender is dropped.
pub fn spawn_event_logger(events: Receiver<MediaEvent>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("event-logger".to_string())
        .spawn(move || {
            for event in events.iter() {
                log_event(&event);
            }
        })
}

fn log_event(event: &MediaEvent) {
    match event {
        MediaEvent::PositionChanged { frame } => trace!(frame, "Position"),
        MediaEvent::LoadProgress { loaded, fraction } => {
            debug!(loaded, progress = %format!("{:.0}%", fraction * 100.0), "Loading");
        }
        MediaEvent::AudioDisabled { message } => warn!("Audio disabled: {}", message),
        MediaEvent::Error {
            recoverable: false,
            message,
        } => error!("{}", message),
        MediaEvent::Error { message, .. } => warn!("{}", message),
        event => info!(?event, "Event"),
    }
}
