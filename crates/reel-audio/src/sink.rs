//! Wav file output for recorded audio.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use reel_ipc::AudioFormat;

use crate::error::AudioError;
use crate::{AudioResult, BITS_PER_SAMPLE};

/// Writes s16le PCM chunks into a wav file.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    samples_written: u64,
}

impl WavSink {
    /// Create (or overwrite) a wav file.
    pub fn create(path: &Path, format: &AudioFormat) -> AudioResult<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        debug!(path = %path.display(), "Wav sink created");

        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            samples_written: 0,
        })
    }

    /// Append one chunk of interleaved s16le samples.
    pub fn write_chunk(&mut self, pcm: &[u8]) -> AudioResult<()> {
        if pcm.len() % 2 != 0 {
            return Err(AudioError::FormatNotSupported(format!(
                "odd PCM chunk length {}",
                pcm.len()
            )));
        }
        let writer = self.writer.as_mut().ok_or(AudioError::DeviceLost)?;

        for sample in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        self.samples_written += (pcm.len() / 2) as u64;
        Ok(())
    }

    /// Flush the header and close the file.
    pub fn finalize(mut self) -> AudioResult<u64> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        info!(
            path = %self.path.display(),
            samples = self.samples_written,
            "Wav sink finalized"
        );
        Ok(self.samples_written)
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Wav sink finalize on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hound::WavReader;

    use super::*;

    #[test]
    fn test_wav_sink_writes_samples() {
        let path = std::env::temp_dir().join(format!("reel-wav-sink-{}.wav", std::process::id()));
        let format = AudioFormat {
            sample_rate: 8000,
            channels: 1,
            chunk_size: 4,
        };

        let mut sink = WavSink::create(&path, &format).unwrap();
        let pcm: Vec<u8> = [1i16, -2, 300, -400]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        sink.write_chunk(&pcm).unwrap();
        sink.write_chunk(&pcm).unwrap();
        assert!(sink.write_chunk(&[0u8; 3]).is_err());
        assert_eq!(sink.finalize().unwrap(), 8);

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, [1, -2, 300, -400, 1, -2, 300, -400]);
        let _ = std::fs::remove_file(&path);
    }
}
