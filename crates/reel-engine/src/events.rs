//! Best-effort event delivery to the shell.

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, trace};

use reel_ipc::MediaEvent;

/// Optional event channel. Sending never blocks; events are dropped when the
/// shell is not keeping up.
#[derive(Clone, Default)]
pub(crate) struct EventSink(Option<Sender<MediaEvent>>);

impl EventSink {
    pub(crate) fn new(sender: Option<Sender<MediaEvent>>) -> Self {
        Self(sender)
    }

    pub(crate) fn send(&self, event: MediaEvent) {
        let Some(sender) = &self.0 else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!(?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Event channel disconnected");
            }
        }
    }
}
