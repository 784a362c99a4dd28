//! Frame decoding through an external `ffmpeg` process.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace, warn};

use reel_ipc::{ToolConfig, VideoSource};

use crate::error::CaptureError;
use crate::frame::Frame;
use crate::source::{FrameSource, SourceInfo};
use crate::CaptureResult;

/// Reads rawvideo RGB24 frames from an `ffmpeg` child's stdout.
pub struct FfmpegReader {
    child: Child,
    stdout: ChildStdout,
    info: SourceInfo,
    frame_bytes: usize,
    sequence: u64,
}

impl FfmpegReader {
    /// Open a video file for sequential decoding.
    #[instrument(name = "ffmpeg_open_file", skip(tools))]
    pub fn open_file(tools: &ToolConfig, path: &Path) -> CaptureResult<Self> {
        if !path.exists() {
            return Err(CaptureError::SourceNotFound(path.display().to_string()));
        }

        let info = probe_video(tools, path)?;

        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path);
        push_rawvideo_output(&mut cmd);

        Self::spawn(cmd, info)
    }

    /// Open a camera at the given frame rate.
    #[instrument(name = "ffmpeg_open_camera", skip(tools))]
    pub fn open_camera(tools: &ToolConfig, source: &VideoSource, fps: f64) -> CaptureResult<Self> {
        let info = SourceInfo {
            width: source.width,
            height: source.height,
            fps,
            frame_count: None,
        };

        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg(camera_format())
            .arg("-framerate")
            .arg(format!("{fps}"))
            .arg("-video_size")
            .arg(format!("{}x{}", source.width, source.height))
            .arg("-i")
            .arg(camera_input(source.index));
        push_rawvideo_output(&mut cmd);

        Self::spawn(cmd, info)
    }

    fn spawn(mut cmd: Command, info: SourceInfo) -> CaptureResult<Self> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        debug!(?cmd, "Spawning decoder");

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| CaptureError::Spawn {
            program,
            source: std::io::Error::new(ErrorKind::BrokenPipe, "decoder stdout not captured"),
        })?;

        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Decoder started"
        );

        Ok(Self {
            child,
            stdout,
            frame_bytes: Frame::rgb24_buffer_size(info.width, info.height),
            info,
            sequence: 0,
        })
    }
}

impl FrameSource for FfmpegReader {
    fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        let mut buffer = vec![0u8; self.frame_bytes];
        let mut filled = 0;

        while filled < buffer.len() {
            match self.stdout.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            debug!(frames = self.sequence, "Decoder reached end of stream");
            return Ok(None);
        }
        if filled < buffer.len() {
            return Err(CaptureError::Decode(format!(
                "truncated frame #{}: {filled} of {} bytes",
                self.sequence,
                buffer.len()
            )));
        }

        let frame = Frame::new(
            Bytes::from(buffer),
            self.info.width,
            self.info.height,
            self.sequence,
        );
        trace!(sequence = self.sequence, "Decoded frame");
        self.sequence += 1;

        Ok(Some(frame))
    }

    fn info(&self) -> &SourceInfo {
        &self.info
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            // Already exited.
            trace!("Decoder kill: {}", e);
        }
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap decoder: {}", e);
        }
    }
}

fn push_rawvideo_output(cmd: &mut Command) {
    cmd.arg("-an")
        .arg("-f")
        .arg("rawvideo")
        .arg("-pix_fmt")
        .arg("rgb24")
        .arg("-");
}

#[cfg(target_os = "macos")]
fn camera_format() -> &'static str {
    "avfoundation"
}

#[cfg(not(target_os = "macos"))]
fn camera_format() -> &'static str {
    "video4linux2"
}

#[cfg(target_os = "macos")]
pub(crate) fn camera_input(index: u32) -> String {
    format!("{index}")
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn camera_input(index: u32) -> String {
    format!("/dev/video{index}")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Read the dimensions, frame rate and frame count of the first video stream.
#[instrument(name = "probe_video", skip(tools))]
pub fn probe_video(tools: &ToolConfig, path: &Path) -> CaptureResult<SourceInfo> {
    let mut cmd = Command::new(&tools.ffprobe);
    cmd.arg("-v").arg("error");
    probe_with(cmd, path.as_os_str())
}

pub(crate) fn probe_with(mut cmd: Command, input: &std::ffi::OsStr) -> CaptureResult<SourceInfo> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames")
        .arg("-of")
        .arg("json")
        .arg(input)
        .output()
        .map_err(|source| CaptureError::Spawn { program, source })?;

    if !output.status.success() {
        return Err(CaptureError::Probe(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(json: &str) -> CaptureResult<SourceInfo> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).map_err(|e| CaptureError::Probe(e.to_string()))?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| CaptureError::Probe("no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(CaptureError::Probe("missing frame dimensions".to_string())),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| CaptureError::Probe("missing frame rate".to_string()))?;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&n| n > 0);

    Ok(SourceInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}
