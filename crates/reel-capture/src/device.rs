//! Camera discovery.

use std::ffi::OsStr;
use std::process::Command;

use tracing::{debug, instrument};

use reel_ipc::{ToolConfig, VideoSource};

use crate::ffmpeg::{camera_input, probe_with};
use crate::MAX_VIDEO_DEVICES;

/// Enumerate cameras by probing device indices in order.
///
/// Discovery stops at the first index that cannot be opened. An empty list
/// means no camera is available.
#[instrument(name = "list_video_sources", skip(tools))]
pub fn list_video_sources(tools: &ToolConfig) -> Vec<VideoSource> {
    let mut sources = Vec::new();

    for index in 0..MAX_VIDEO_DEVICES {
        let input = camera_input(index);

        #[cfg(not(target_os = "macos"))]
        if !std::path::Path::new(&input).exists() {
            break;
        }

        let mut cmd = Command::new(&tools.ffprobe);
        cmd.arg("-v").arg("error").arg("-f").arg(probe_format());

        match probe_with(cmd, OsStr::new(&input)) {
            Ok(info) => sources.push(VideoSource {
                index,
                height: info.height,
                width: info.width,
            }),
            Err(e) => {
                debug!(index, "Stopping camera discovery: {}", e);
                break;
            }
        }
    }

    debug!(count = sources.len(), "Enumerated video sources");
    sources
}

#[cfg(target_os = "macos")]
fn probe_format() -> &'static str {
    "avfoundation"
}

#[cfg(not(target_os = "macos"))]
fn probe_format() -> &'static str {
    "video4linux2"
}
