//! Common types used across crates and messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest accepted frame rate. Slower rates would need frame periods
/// beyond what a tick duration can represent.
pub const MIN_FPS: f64 = 0.01;

/// Accept a frame rate of at least [`MIN_FPS`].
pub fn check_fps(fps: f64) -> Result<(), ConfigError> {
    if !fps.is_finite() || fps < MIN_FPS {
        return Err(ConfigError::InvalidFps(fps));
    }
    Ok(())
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Frame rate must be finite and at least [`MIN_FPS`].
    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),

    /// Skip size must be non-negative and finite.
    #[error("Invalid skip size: {0}s")]
    InvalidSkip(f64),

    /// Display size has a zero dimension.
    #[error("Invalid display size: {width}x{height}")]
    InvalidDisplaySize { width: u32, height: u32 },

    /// Audio format has a zero field.
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),

    /// Clip range is empty or inverted.
    #[error("Invalid clip range: [{start}, {end})")]
    InvalidClipRange { start: usize, end: usize },
}

/// A camera found by device discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    /// Device index (`/dev/video{index}` on Linux).
    pub index: u32,

    /// Native frame height in pixels.
    pub height: u32,

    /// Native frame width in pixels.
    pub width: u32,
}

/// A microphone found by device discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    /// Position in the enumeration.
    pub index: u32,

    /// Display name.
    pub name: String,

    /// Audio host device name, passed to the capture backend as-is.
    pub id: String,
}

/// Display size of rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Fit to a source. With `keep_ratio` the width is kept and the height
    /// follows the source aspect ratio.
    pub fn fit(self, source_width: u32, source_height: u32, keep_ratio: bool) -> Self {
        if !keep_ratio || source_width == 0 || source_height == 0 {
            return self;
        }
        let aspect = f64::from(source_width) / f64::from(source_height);
        let height = (f64::from(self.width) / aspect) as u32;
        Self {
            width: self.width,
            height: height.max(1),
        }
    }

    fn validate(self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDisplaySize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self::new(640, 360)
    }
}

/// Signed 16-bit interleaved PCM format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Sample frames per chunk.
    pub chunk_size: usize,
}

impl AudioFormat {
    /// Bytes per sample (s16le).
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Size in bytes of one full chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_size * self.channels as usize * Self::BYTES_PER_SAMPLE
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 || self.channels == 0 || self.chunk_size == 0 {
            return Err(ConfigError::InvalidAudioFormat(format!(
                "{} Hz, {} channels, {} frames per chunk",
                self.sample_rate, self.channels, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            chunk_size: 1024,
        }
    }
}

/// Inclusive-start, exclusive-end frame window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRange {
    pub start: usize,
    pub end: usize,
}

impl ClipRange {
    pub fn new(start: usize, end: usize) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::InvalidClipRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Last frame that may be shown.
    pub fn last(&self) -> usize {
        self.end - 1
    }
}

/// Paths of the external media executables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Decoder, encoder and transcoder.
    pub ffmpeg: PathBuf,

    /// Stream metadata probe.
    pub ffprobe: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Configuration for a video player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Size frames are resized to when loaded.
    pub display_size: DisplaySize,

    /// Keep the source aspect ratio (width wins).
    pub keep_ratio: bool,

    /// Seconds moved by a forward/backward skip.
    pub skip_seconds: f64,

    /// Extract and play the audio track.
    pub audio: bool,

    /// Sample frames per cached audio chunk.
    pub audio_chunk_size: usize,

    /// External executables.
    pub tools: ToolConfig,
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.display_size.validate()?;
        if !self.skip_seconds.is_finite() || self.skip_seconds < 0.0 {
            return Err(ConfigError::InvalidSkip(self.skip_seconds));
        }
        if self.audio_chunk_size == 0 {
            return Err(ConfigError::InvalidAudioFormat(
                "audio chunk size is zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            display_size: DisplaySize::default(),
            keep_ratio: false,
            skip_seconds: 1.0,
            audio: true,
            audio_chunk_size: 1024,
            tools: ToolConfig::default(),
        }
    }
}

/// Configuration for a camera/microphone recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Capture and recording frame rate.
    pub fps: f64,

    /// Size of preview frames.
    pub display_size: DisplaySize,

    /// Keep the camera aspect ratio for preview (width wins).
    pub keep_ratio: bool,

    /// Raw video output.
    pub video_path: PathBuf,

    /// Raw audio (wav) output.
    pub audio_path: PathBuf,

    /// Microphone format.
    pub audio_format: AudioFormat,

    /// External executables.
    pub tools: ToolConfig,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fps(self.fps)?;
        self.display_size.validate()?;
        self.audio_format.validate()
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            display_size: DisplaySize::default(),
            keep_ratio: true,
            video_path: PathBuf::from("raw_video.mp4"),
            audio_path: PathBuf::from("recorded_audio.wav"),
            audio_format: AudioFormat::default(),
            tools: ToolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_size_keep_ratio() {
        let size = DisplaySize::new(640, 360).fit(1920, 1080, true);
        assert_eq!(size, DisplaySize::new(640, 360));

        let size = DisplaySize::new(300, 300).fit(640, 480, true);
        assert_eq!(size, DisplaySize::new(300, 225));

        let size = DisplaySize::new(300, 300).fit(640, 480, false);
        assert_eq!(size, DisplaySize::new(300, 300));
    }

    #[test]
    fn test_audio_chunk_bytes() {
        let format = AudioFormat {
            sample_rate: 44100,
            channels: 2,
            chunk_size: 1024,
        };
        assert_eq!(format.chunk_bytes(), 4096);
    }

    #[test]
    fn test_clip_range_rejects_empty() {
        assert!(ClipRange::new(5, 5).is_err());
        assert!(ClipRange::new(6, 5).is_err());

        let clip = ClipRange::new(2, 5).unwrap();
        assert_eq!(clip.last(), 4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RecorderConfig = serde_json::from_str(r#"{ "fps": 8.0 }"#).unwrap();
        assert_eq!(config.fps, 8.0);
        assert_eq!(config.audio_format, AudioFormat::default());
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_config_validation() {
        assert!(PlayerConfig::default().validate().is_ok());
        assert!(RecorderConfig::default().validate().is_ok());

        let config = RecorderConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidFps(0.0)));

        let config = RecorderConfig {
            fps: 1e-300,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidFps(1e-300)));
        assert!(check_fps(MIN_FPS).is_ok());
        assert!(check_fps(f64::INFINITY).is_err());

        let config = PlayerConfig {
            skip_seconds: -1.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSkip(-1.0)));
    }
}
