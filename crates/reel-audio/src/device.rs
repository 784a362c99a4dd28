//! Microphone enumeration.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, instrument, warn};

use reel_ipc::AudioSource;

/// Enumerate the input devices of the default audio host.
///
/// An empty list means no microphone is available.
#[instrument(name = "list_audio_sources")]
pub fn list_audio_sources() -> Vec<AudioSource> {
    let host = cpal::default_host();
    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Failed to enumerate input devices: {}", e);
            return Vec::new();
        }
    };

    let names = devices.filter_map(|device| match device.name() {
        Ok(name) => Some(name),
        Err(e) => {
            warn!("Failed to get device name: {}", e);
            None
        }
    });

    let sources = sources_from_names(names);
    debug!(host = ?host.id(), count = sources.len(), "Enumerated audio sources");
    sources
}

/// Number devices in enumeration order. The host name doubles as the
/// capture backend identifier.
fn sources_from_names(names: impl IntoIterator<Item = String>) -> Vec<AudioSource> {
    names
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .enumerate()
        .map(|(index, name)| AudioSource {
            index: index as u32,
            id: name.clone(),
            name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_from_names() {
        let names = ["default", "", "hw:CARD=PCH,DEV=0", "MacBook Pro Microphone"]
            .map(String::from);
        let sources = sources_from_names(names);

        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].index, 0);
        assert_eq!(sources[0].id, "default");
        assert_eq!(sources[1].index, 1);
        assert_eq!(sources[1].id, "hw:CARD=PCH,DEV=0");
        assert_eq!(sources[2].name, "MacBook Pro Microphone");
    }
}
