//! Audio track cache, filled from a wav file by a background loader.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use hound::{SampleFormat, WavReader};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use reel_ipc::AudioFormat;

use crate::error::AudioError;
use crate::{AudioResult, BITS_PER_SAMPLE};

/// Ordered, append-only list of fixed-size PCM chunks.
///
/// A chunk index is its position in the track. Readers may read any index
/// below `chunks_loaded()` while the loader keeps appending.
#[derive(Default)]
pub struct AudioTrackCache {
    chunks: RwLock<Vec<Bytes>>,
    loaded: AtomicUsize,
    estimate: AtomicUsize,
    finished: AtomicBool,
    format: RwLock<Option<AudioFormat>>,
}

impl AudioTrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chunk at `index`, if loaded.
    pub fn chunk_at(&self, index: usize) -> Option<Bytes> {
        if index >= self.chunks_loaded() {
            return None;
        }
        self.chunks.read().get(index).cloned()
    }

    /// Chunks available so far.
    pub fn chunks_loaded(&self) -> usize {
        self.loaded.load(Ordering::Acquire)
    }

    /// Expected chunk count of the whole track, never below what is loaded.
    pub fn total_chunks_estimate(&self) -> usize {
        self.estimate
            .load(Ordering::Acquire)
            .max(self.chunks_loaded())
    }

    /// True once the loader stopped (end of file, error or cancel).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// PCM format of the chunks, known once the loader opened the file.
    pub fn format(&self) -> Option<AudioFormat> {
        *self.format.read()
    }

    fn push(&self, chunk: Bytes) {
        self.chunks.write().push(chunk);
        self.loaded.fetch_add(1, Ordering::Release);
    }
}

/// Reads a 16-bit PCM wav file into an [`AudioTrackCache`] on its own thread.
pub struct AudioTrackLoader {
    cache: Arc<AudioTrackCache>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioTrackLoader {
    /// Open `wav` and start loading chunks of `chunk_size` sample frames.
    #[instrument(name = "audio_loader_spawn")]
    pub fn spawn(wav: &Path, chunk_size: usize) -> AudioResult<Self> {
        if chunk_size == 0 {
            return Err(AudioError::FormatNotSupported("zero chunk size".to_string()));
        }

        let reader = WavReader::open(wav)?;
        let spec = reader.spec();
        if spec.bits_per_sample != BITS_PER_SAMPLE || spec.sample_format != SampleFormat::Int {
            return Err(AudioError::FormatNotSupported(format!(
                "{}-bit {:?} wav",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let format = AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            chunk_size,
        };

        let cache = Arc::new(AudioTrackCache::new());
        *cache.format.write() = Some(format);
        let estimate = (reader.duration() as usize).div_ceil(chunk_size);
        cache.estimate.store(estimate, Ordering::Release);

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            estimate,
            "Loading audio track"
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name("audio-loader".to_string()).spawn({
            let cache = Arc::clone(&cache);
            let cancel = Arc::clone(&cancel);
            move || load_thread(reader, format, cache, cancel)
        })?;

        Ok(Self {
            cache,
            cancel,
            handle: Some(handle),
        })
    }

    /// Shared handle to the cache being filled.
    pub fn cache(&self) -> Arc<AudioTrackCache> {
        Arc::clone(&self.cache)
    }

    /// Stop loading after the current chunk.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl Drop for AudioTrackLoader {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn load_thread<R: std::io::Read>(
    mut reader: WavReader<R>,
    format: AudioFormat,
    cache: Arc<AudioTrackCache>,
    cancel: Arc<AtomicBool>,
) {
    let chunk_bytes = format.chunk_bytes();
    let mut buffer = Vec::with_capacity(chunk_bytes);

    for sample in reader.samples::<i16>() {
        if cancel.load(Ordering::SeqCst) {
            debug!("Audio loading cancelled");
            buffer.clear();
            break;
        }

        match sample {
            Ok(sample) => buffer.extend_from_slice(&sample.to_le_bytes()),
            Err(e) => {
                warn!("Audio track read error: {}", e);
                break;
            }
        }

        if buffer.len() == chunk_bytes {
            cache.push(Bytes::from(std::mem::replace(
                &mut buffer,
                Vec::with_capacity(chunk_bytes),
            )));
        }
    }

    if !buffer.is_empty() {
        cache.push(Bytes::from(buffer));
    }

    cache.finished.store(true, Ordering::Release);
    debug!(chunks = cache.chunks_loaded(), "Audio loader finished");
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use hound::{WavSpec, WavWriter};

    use super::*;

    fn write_wav(name: &str, spec: WavSpec, samples: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("reel-track-{}-{}.wav", name, std::process::id()));
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..samples {
            match spec.sample_format {
                SampleFormat::Int => writer.write_sample(i as i16).unwrap(),
                SampleFormat::Float => writer.write_sample(i as f32).unwrap(),
            }
        }
        writer.finalize().unwrap();
        path
    }

    fn wait_finished(cache: &AudioTrackCache) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cache.is_finished() {
            assert!(Instant::now() < deadline, "audio loader did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_loads_fixed_size_chunks() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        // 10 sample frames of 2 channels, chunks of 4 frames -> 4 + 4 + 2.
        let path = write_wav("chunks", spec, 20);

        let loader = AudioTrackLoader::spawn(&path, 4).unwrap();
        let cache = loader.cache();
        assert_eq!(cache.total_chunks_estimate(), 3);
        wait_finished(&cache);

        assert_eq!(cache.chunks_loaded(), 3);
        assert_eq!(cache.chunk_at(0).unwrap().len(), 16);
        assert_eq!(cache.chunk_at(2).unwrap().len(), 8);
        assert!(cache.chunk_at(3).is_none());

        let first = cache.chunk_at(1).unwrap();
        assert_eq!(i16::from_le_bytes([first[0], first[1]]), 8);
        assert_eq!(cache.format().unwrap().channels, 2);

        drop(loader);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_float_wav() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let path = write_wav("float", spec, 8);
        assert!(matches!(
            AudioTrackLoader::spawn(&path, 4),
            Err(AudioError::FormatNotSupported(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
