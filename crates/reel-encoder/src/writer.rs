//! Video file writer backed by an `ffmpeg` child process.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, instrument, trace, warn};

use reel_ipc::{check_fps, ToolConfig};

use crate::error::EncoderError;
use crate::{EncoderResult, VideoEncoderConfig, VideoSink};

/// Pipes RGB24 frames into `ffmpeg`, which encodes them to H.264.
pub struct FfmpegVideoWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    config: VideoEncoderConfig,
    path: PathBuf,
    frame_count: u64,
}

impl FfmpegVideoWriter {
    /// Create (or overwrite) a video file.
    #[instrument(name = "video_writer_create", skip(tools, config))]
    pub fn create(
        tools: &ToolConfig,
        path: &Path,
        config: VideoEncoderConfig,
    ) -> EncoderResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(EncoderError::InvalidInput(format!(
                "frame size {}x{}",
                config.width, config.height
            )));
        }
        check_fps(config.fps).map_err(|e| EncoderError::InvalidInput(e.to_string()))?;

        debug!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "Starting video writer"
        );

        let mut child = Command::new(&tools.ffmpeg)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", config.width, config.height))
            .arg("-r")
            .arg(format!("{}", config.fps))
            .arg("-i")
            .arg("-")
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EncoderError::Initialization(format!(
                    "failed to start {}: {}",
                    tools.ffmpeg.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take();

        info!(path = %path.display(), "Video writer ready");

        Ok(Self {
            child: Some(child),
            stdin,
            config,
            path: path.to_path_buf(),
            frame_count: 0,
        })
    }
}

impl VideoSink for FfmpegVideoWriter {
    fn append(&mut self, frame: &[u8]) -> EncoderResult<()> {
        let stdin = self.stdin.as_mut().ok_or(EncoderError::NotInitialized)?;

        let expected = self.config.frame_bytes();
        if frame.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "frame is {} bytes, expected {}",
                frame.len(),
                expected
            )));
        }

        stdin.write_all(frame).map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => EncoderError::Encoding("encoder exited".to_string()),
            _ => EncoderError::Io(e),
        })?;

        self.frame_count += 1;
        trace!(frame = self.frame_count, "Frame written");
        Ok(())
    }

    fn close(&mut self) -> EncoderResult<()> {
        // Closing stdin signals end of input.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(EncoderError::Encoding(format!(
                "encoder exited with {status}"
            )));
        }

        info!(
            path = %self.path.display(),
            frames = self.frame_count,
            "Video writer closed"
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frame_count
    }

    fn name(&self) -> &'static str {
        "ffmpeg-libx264"
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Video writer close on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_size() {
        let config = VideoEncoderConfig {
            width: 0,
            height: 480,
            fps: 30.0,
        };
        let result = FfmpegVideoWriter::create(
            &ToolConfig::default(),
            Path::new("unused.mp4"),
            config,
        );
        assert!(matches!(result, Err(EncoderError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_executable() {
        let tools = ToolConfig {
            ffmpeg: PathBuf::from("/nonexistent/reel/ffmpeg"),
            ..Default::default()
        };
        let config = VideoEncoderConfig {
            width: 4,
            height: 4,
            fps: 10.0,
        };
        let result = FfmpegVideoWriter::create(&tools, Path::new("unused.mp4"), config);
        assert!(matches!(result, Err(EncoderError::Initialization(_))));
    }
}
