//! Configuration loading.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use reel_ipc::ToolConfig;

/// Environment variable overriding the `ffmpeg` executable.
pub const FFMPEG_ENV: &str = "REEL_FFMPEG";

/// Read a JSON config file, or use defaults when no file is given. Missing
/// fields take their default values.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Apply the `REEL_FFMPEG` override.
pub fn apply_env(tools: &mut ToolConfig) {
    apply_ffmpeg_override(tools, std::env::var_os(FFMPEG_ENV));
}

fn apply_ffmpeg_override(tools: &mut ToolConfig, value: Option<OsString>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        tools.ffmpeg = PathBuf::from(value);
    }
}

#[cfg(test)]
mod tests {
    use reel_ipc::{PlayerConfig, RecorderConfig};

    use super::*;

    #[test]
    fn test_load_defaults_without_file() {
        let config: PlayerConfig = load(None).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!("reel-config-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "fps": 15.0, "video_path": "take.mp4", "tools": { "ffmpeg": "/opt/ffmpeg" } }"#,
        )
        .unwrap();

        let config: RecorderConfig = load(Some(&path)).unwrap();
        assert_eq!(config.fps, 15.0);
        assert_eq!(config.video_path, PathBuf::from("take.mp4"));
        assert_eq!(config.tools.ffmpeg, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.tools.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(config.audio_path, RecorderConfig::default().audio_path);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let result: Result<PlayerConfig> = load(Some(Path::new("/nonexistent/reel.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_ffmpeg_override() {
        let mut tools = ToolConfig::default();
        apply_ffmpeg_override(&mut tools, None);
        assert_eq!(tools.ffmpeg, PathBuf::from("ffmpeg"));

        apply_ffmpeg_override(&mut tools, Some(OsString::new()));
        assert_eq!(tools.ffmpeg, PathBuf::from("ffmpeg"));

        apply_ffmpeg_override(&mut tools, Some(OsString::from("/usr/local/bin/ffmpeg")));
        assert_eq!(tools.ffmpeg, PathBuf::from("/usr/local/bin/ffmpeg"));
    }
}
