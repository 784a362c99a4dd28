//! Runs the external transcoder to completion.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use reel_ipc::ToolConfig;

use crate::error::EncoderError;
use crate::EncoderResult;

/// Wrapper around an `ffmpeg` executable for whole-file operations.
#[derive(Debug, Clone)]
pub struct Transcoder {
    executable: PathBuf,
}

impl Transcoder {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn from_tools(tools: &ToolConfig) -> Self {
        Self::new(tools.ffmpeg.clone())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Multiplex `video` and `audio` into `output`. The video stream is
    /// copied, the shorter stream sets the duration, `output` is overwritten.
    #[instrument(name = "transcoder_merge", skip(self))]
    pub fn try_merge(&self, video: &Path, audio: &Path, output: &Path) -> EncoderResult<()> {
        for input in [video, audio] {
            if !input.exists() {
                return Err(EncoderError::InvalidInput(format!(
                    "{} does not exist",
                    input.display()
                )));
            }
        }

        self.run(merge_args(video, audio, output))?;
        info!(output = %output.display(), "Merged video and audio");
        Ok(())
    }

    /// Like [`Transcoder::try_merge`], reporting only success. On success the
    /// inputs are removed when `delete_sources` is set; on failure they are
    /// left untouched and `output` may or may not exist.
    pub fn merge(&self, video: &Path, audio: &Path, output: &Path, delete_sources: bool) -> bool {
        if let Err(e) = self.try_merge(video, audio, output) {
            warn!("Merge failed: {}", e);
            return false;
        }

        if delete_sources {
            for input in [video, audio] {
                // The merged output may reuse an input's path.
                if input == output {
                    continue;
                }
                if let Err(e) = std::fs::remove_file(input) {
                    warn!(path = %input.display(), "Failed to delete merge source: {}", e);
                }
            }
        }

        true
    }

    /// Demux the audio track of `source` into a 16-bit PCM wav file.
    #[instrument(name = "transcoder_extract_audio", skip(self))]
    pub fn extract_audio(&self, source: &Path, wav: &Path) -> EncoderResult<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            source.into(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            wav.into(),
        ];
        self.run(args)?;
        info!(wav = %wav.display(), "Extracted audio track");
        Ok(())
    }

    fn run(&self, args: Vec<OsString>) -> EncoderResult<()> {
        debug!(executable = %self.executable.display(), ?args, "Running transcoder");

        let output = Command::new(&self.executable)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    EncoderError::TranscoderMissing(self.executable.clone())
                }
                _ => EncoderError::Io(e),
            })?;

        if !output.status.success() {
            return Err(EncoderError::TranscoderFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c:v".into(),
        "copy".into(),
        "-shortest".into(),
        output.into(),
    ]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("reel-transcoder-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let video = dir.join("raw.mp4");
        let audio = dir.join("raw.wav");
        fs::write(&video, b"video").unwrap();
        fs::write(&audio, b"audio").unwrap();
        (video, audio)
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_merge_args() {
        let args = merge_args(Path::new("v.mp4"), Path::new("a.wav"), Path::new("out.mp4"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-y", "-i", "v.mp4", "-i", "a.wav", "-c:v", "copy", "-shortest", "out.mp4"]
        );
    }

    #[test]
    fn test_merge_missing_executable_leaves_inputs() {
        let dir = temp_dir("missing");
        let (video, audio) = inputs(&dir);
        let output = dir.join("merged.mp4");

        let transcoder = Transcoder::new(dir.join("no-such-ffmpeg"));
        assert!(matches!(
            transcoder.try_merge(&video, &audio, &output),
            Err(EncoderError::TranscoderMissing(_))
        ));
        assert!(!transcoder.merge(&video, &audio, &output, true));

        assert!(video.exists());
        assert!(audio.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_merge_missing_input() {
        let dir = temp_dir("noinput");
        let transcoder = Transcoder::new("ffmpeg");
        let result = transcoder.try_merge(
            &dir.join("absent.mp4"),
            &dir.join("absent.wav"),
            &dir.join("out.mp4"),
        );
        assert!(matches!(result, Err(EncoderError::InvalidInput(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_success_deletes_sources() {
        let dir = temp_dir("success");
        let (video, audio) = inputs(&dir);
        let output = dir.join("merged.mp4");

        // Writes "merged" to its last argument.
        let fake = script(&dir, r#"for last; do :; done; echo merged > "$last""#);
        let transcoder = Transcoder::new(fake);

        assert!(transcoder.merge(&video, &audio, &output, true));
        assert_eq!(fs::read_to_string(&output).unwrap().trim(), "merged");
        assert!(!video.exists());
        assert!(!audio.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_nonzero_exit() {
        let dir = temp_dir("failure");
        let (video, audio) = inputs(&dir);
        let output = dir.join("merged.mp4");

        let fake = script(&dir, "echo broken >&2; exit 3");
        let transcoder = Transcoder::new(fake);

        match transcoder.try_merge(&video, &audio, &output) {
            Err(EncoderError::TranscoderFailed { status, stderr }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!transcoder.merge(&video, &audio, &output, true));
        assert!(video.exists());
        assert!(audio.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
