//! Microphone capture through an `ffmpeg` child process.

use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use bytes::Bytes;
use tracing::{debug, info, instrument, trace, warn};

use reel_ipc::{AudioFormat, AudioSource, ToolConfig};

use crate::error::AudioError;
use crate::AudioResult;

/// A chunk of interleaved s16le PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// PCM bytes.
    pub data: Bytes,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

/// Blocking source of fixed-size PCM chunks.
pub trait AudioInput: Send {
    /// Block until one full chunk is available.
    fn read_chunk(&mut self) -> AudioResult<AudioChunk>;

    /// Format of the chunks.
    fn format(&self) -> &AudioFormat;
}

/// Reads a microphone via `ffmpeg`, which converts to the requested format.
pub struct MicrophoneCapture {
    child: Child,
    stdout: ChildStdout,
    format: AudioFormat,
    sequence: u64,
}

impl MicrophoneCapture {
    /// Open a microphone.
    #[instrument(name = "microphone_open", skip(tools))]
    pub fn open(tools: &ToolConfig, source: &AudioSource, format: AudioFormat) -> AudioResult<Self> {
        format
            .validate()
            .map_err(|e| AudioError::FormatNotSupported(e.to_string()))?;

        let program = tools.ffmpeg.display().to_string();
        let mut child = Command::new(&tools.ffmpeg)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg(input_format())
            .arg("-i")
            .arg(input_device(source))
            .arg("-f")
            .arg("s16le")
            .arg("-ac")
            .arg(format.channels.to_string())
            .arg("-ar")
            .arg(format.sample_rate.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| AudioError::Spawn {
            program,
            source: std::io::Error::new(ErrorKind::BrokenPipe, "capture stdout not captured"),
        })?;

        info!(
            device = %source.id,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Microphone capture started"
        );

        Ok(Self {
            child,
            stdout,
            format,
            sequence: 0,
        })
    }
}

impl AudioInput for MicrophoneCapture {
    fn read_chunk(&mut self) -> AudioResult<AudioChunk> {
        let mut buffer = vec![0u8; self.format.chunk_bytes()];

        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(chunks = self.sequence, "Microphone stream ended");
                return Err(AudioError::DeviceLost);
            }
            Err(e) => return Err(e.into()),
        }

        let chunk = AudioChunk {
            data: Bytes::from(buffer),
            sequence: self.sequence,
        };
        trace!(sequence = self.sequence, "Captured audio chunk");
        self.sequence += 1;
        Ok(chunk)
    }

    fn format(&self) -> &AudioFormat {
        &self.format
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap microphone capture: {}", e);
        }
    }
}

#[cfg(target_os = "macos")]
fn input_format() -> &'static str {
    "avfoundation"
}

#[cfg(not(target_os = "macos"))]
fn input_format() -> &'static str {
    "alsa"
}

// avfoundation resolves audio devices by name after the colon.
#[cfg(target_os = "macos")]
fn input_device(source: &AudioSource) -> String {
    format!(":{}", source.id)
}

#[cfg(not(target_os = "macos"))]
fn input_device(source: &AudioSource) -> String {
    source.id.clone()
}
