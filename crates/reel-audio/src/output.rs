//! Raw PCM playback.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, info, instrument, warn};

use reel_ipc::AudioFormat;

use crate::error::AudioError;
use crate::AudioResult;

/// Chunks allowed to sit in the device queue before `write` blocks.
const QUEUED_CHUNKS: usize = 2;

/// How long `write` waits for the queue to drain before giving up.
const STALL_LIMIT: Duration = Duration::from_secs(2);

const PACE_INTERVAL: Duration = Duration::from_millis(2);

/// Blocking sink for PCM chunks; `write` returns once the device accepted
/// the data, which paces the caller.
pub trait AudioOutput: Send {
    fn write(&mut self, pcm: &[u8]) -> AudioResult<()>;

    /// Drop everything queued but not yet heard.
    fn clear(&mut self);
}

/// Plays s16le PCM on the default output device.
///
/// The device stream lives on its own thread for as long as the output
/// exists; chunks are queued on a [`Sink`] that is discarded by
/// [`AudioOutput::clear`] and recreated on the next write.
pub struct RodioAudioOutput {
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    format: AudioFormat,
    shutdown: Option<Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl RodioAudioOutput {
    #[instrument(name = "audio_output_open")]
    pub fn open(format: &AudioFormat) -> AudioResult<Self> {
        format
            .validate()
            .map_err(|e| AudioError::FormatNotSupported(e.to_string()))?;

        let (ready_tx, ready_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let stream_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Returns once the owner drops its sender.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    debug!("Audio output stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|source| AudioError::Spawn {
                program: "audio-output".to_string(),
                source,
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|_| AudioError::Output("output thread exited".to_string()))?
            .map_err(AudioError::Output)?;

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Audio output opened"
        );

        Ok(Self {
            handle,
            sink: None,
            format: *format,
            shutdown: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
        })
    }

    fn sink(&mut self) -> AudioResult<&Sink> {
        if self.sink.is_none() {
            let sink =
                Sink::try_new(&self.handle).map_err(|e| AudioError::Output(e.to_string()))?;
            self.sink = Some(sink);
        }
        self.sink
            .as_ref()
            .ok_or_else(|| AudioError::Output("no sink".to_string()))
    }
}

impl AudioOutput for RodioAudioOutput {
    fn write(&mut self, pcm: &[u8]) -> AudioResult<()> {
        let samples = samples_from_pcm(pcm)?;
        let format = self.format;
        let sink = self.sink()?;
        sink.append(SamplesBuffer::new(
            format.channels,
            format.sample_rate,
            samples,
        ));

        let deadline = Instant::now() + STALL_LIMIT;
        while sink.len() > QUEUED_CHUNKS {
            if Instant::now() >= deadline {
                return Err(AudioError::DeviceLost);
            }
            thread::sleep(PACE_INTERVAL);
        }
        Ok(())
    }

    fn clear(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("Audio output cleared");
        }
    }
}

impl Drop for RodioAudioOutput {
    fn drop(&mut self) {
        self.clear();
        drop(self.shutdown.take());
        if let Some(thread) = self.stream_thread.take() {
            if thread.join().is_err() {
                warn!("Audio output thread panicked");
            }
        }
    }
}

/// Decode interleaved s16le bytes.
fn samples_from_pcm(pcm: &[u8]) -> AudioResult<Vec<i16>> {
    if pcm.len() % AudioFormat::BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::FormatNotSupported(format!(
            "odd PCM chunk length {}",
            pcm.len()
        )));
    }
    Ok(pcm
        .chunks_exact(AudioFormat::BYTES_PER_SAMPLE)
        .map(|sample| i16::from_le_bytes([sample[0], sample[1]]))
        .collect())
}
