//! Camera and microphone recorder.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use reel_audio::{AudioInput, MicrophoneCapture, WavSink};
use reel_capture::{FfmpegReader, Frame, FrameSource, LatestFrame};
use reel_encoder::{FfmpegVideoWriter, Transcoder, VideoEncoderConfig, VideoSink};
use reel_ipc::{
    AudioFormat, AudioSource, CaptureState, DisplaySize, MediaEvent, RecorderConfig, StopReason,
    ToolConfig, VideoSource,
};

use crate::display::DisplayTarget;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::lifecycle::{Lifecycle, StopSignal};
use crate::ticker::Ticker;
use crate::EngineResult;

/// Opens the devices and sinks a recorder works with.
pub trait MediaBackend: Send + Sync {
    fn open_camera(&self, source: &VideoSource, fps: f64) -> EngineResult<Box<dyn FrameSource>>;

    fn open_microphone(
        &self,
        source: &AudioSource,
        format: AudioFormat,
    ) -> EngineResult<Box<dyn AudioInput>>;

    fn create_video_sink(
        &self,
        path: &Path,
        config: VideoEncoderConfig,
    ) -> EngineResult<Box<dyn VideoSink>>;
}

/// Devices and sinks backed by `ffmpeg` child processes.
pub struct FfmpegBackend {
    tools: ToolConfig,
}

impl FfmpegBackend {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_camera(&self, source: &VideoSource, fps: f64) -> EngineResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegReader::open_camera(&self.tools, source, fps)?))
    }

    fn open_microphone(
        &self,
        source: &AudioSource,
        format: AudioFormat,
    ) -> EngineResult<Box<dyn AudioInput>> {
        Ok(Box::new(MicrophoneCapture::open(&self.tools, source, format)?))
    }

    fn create_video_sink(
        &self,
        path: &Path,
        config: VideoEncoderConfig,
    ) -> EngineResult<Box<dyn VideoSink>> {
        Ok(Box::new(FfmpegVideoWriter::create(&self.tools, path, config)?))
    }
}

/// First device among `sources`, or [`EngineError::DeviceUnavailable`] when
/// discovery (after any filtering) found nothing to open.
pub fn first_available<T>(sources: impl IntoIterator<Item = T>) -> EngineResult<T> {
    sources
        .into_iter()
        .next()
        .ok_or(EngineError::DeviceUnavailable)
}

struct OpenSink {
    path: PathBuf,
    sink: Box<dyn VideoSink>,
}

struct Shared {
    display: Arc<dyn DisplayTarget>,
    events: EventSink,
    state: Mutex<CaptureState>,
    armed: AtomicBool,
    latest: LatestFrame,
    video_sink: Mutex<Option<OpenSink>>,
    audio_chunks: Mutex<Vec<Bytes>>,
    frames_recorded: AtomicU64,
}

impl Shared {
    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn set_state(&self, new_state: CaptureState) {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = new_state;
            previous
        };
        if previous == new_state {
            return;
        }

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );
        self.events.send(MediaEvent::CaptureStateChanged {
            previous,
            current: new_state,
        });
    }

    fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
        let capturing = self.state.lock().is_capturing();
        if capturing {
            self.set_state(CaptureState::Capturing { armed });
        }
    }

    fn record(&self, frame: &Frame) -> EngineResult<()> {
        let mut sink = self.video_sink.lock();
        if let Some(open) = sink.as_mut() {
            open.sink.append(&frame.data)?;
            self.frames_recorded.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// End the session after an unrecoverable device or sink error.
    fn fail(&self, signal: &StopSignal, reason: StopReason) {
        error!(reason = %reason.message(), "Capture session ended");
        signal.signal_stop();
        self.set_state(CaptureState::Idle);
        self.events.send(MediaEvent::Error {
            recoverable: false,
            message: reason.message(),
        });
    }
}

/// Live camera preview with optional recording to a video file and a wav
/// file.
///
/// Capture runs three loops: one pulls camera frames at the configured rate
/// and appends them to the video sink while recording is armed, one renders
/// the newest frame to the display, and one reads microphone chunks. Audio
/// recorded while armed is held in memory and written out when capture
/// stops. Arming and disarming within one session keeps appending to the
/// same video file.
pub struct VideoRecorder {
    video_source: VideoSource,
    audio_source: Option<AudioSource>,
    config: RecorderConfig,
    size: DisplaySize,
    backend: Arc<dyn MediaBackend>,
    shared: Arc<Shared>,
    capture: Lifecycle,
    op_lock: Mutex<()>,
    video_path: Mutex<PathBuf>,
}

impl VideoRecorder {
    /// Recorder using `ffmpeg` for devices and encoding.
    pub fn new(
        video_source: VideoSource,
        audio_source: Option<AudioSource>,
        display: Arc<dyn DisplayTarget>,
        config: RecorderConfig,
        events: Option<Sender<MediaEvent>>,
    ) -> EngineResult<Self> {
        let backend = Arc::new(FfmpegBackend::new(config.tools.clone()));
        Self::with_backend(backend, video_source, audio_source, display, config, events)
    }

    #[instrument(name = "recorder_new", skip(backend, display, config, events))]
    pub fn with_backend(
        backend: Arc<dyn MediaBackend>,
        video_source: VideoSource,
        audio_source: Option<AudioSource>,
        display: Arc<dyn DisplayTarget>,
        config: RecorderConfig,
        events: Option<Sender<MediaEvent>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        if video_source.width == 0 || video_source.height == 0 {
            return Err(EngineError::InvalidSource(format!(
                "camera {} reports {}x{}",
                video_source.index, video_source.width, video_source.height
            )));
        }

        let size = config
            .display_size
            .fit(video_source.width, video_source.height, config.keep_ratio);

        info!(
            camera = video_source.index,
            microphone = audio_source.as_ref().map(|s| s.id.as_str()),
            fps = config.fps,
            "Video recorder ready"
        );

        Ok(Self {
            video_path: Mutex::new(config.video_path.clone()),
            video_source,
            audio_source,
            size,
            backend,
            shared: Arc::new(Shared {
                display,
                events: EventSink::new(events),
                state: Mutex::new(CaptureState::Idle),
                armed: AtomicBool::new(false),
                latest: LatestFrame::new(),
                video_sink: Mutex::new(None),
                audio_chunks: Mutex::new(Vec::new()),
                frames_recorded: AtomicU64::new(0),
            }),
            capture: Lifecycle::new("capture"),
            op_lock: Mutex::new(()),
            config,
        })
    }

    /// Open the devices and start previewing. No-op while capturing.
    ///
    /// A microphone that fails to open is reported and capture continues
    /// without audio.
    #[instrument(name = "recorder_start_capture", skip(self))]
    pub fn start_capture(&self) -> EngineResult<()> {
        let _op = self.op_lock.lock();
        if self.capture.is_running() {
            debug!("Already capturing, ignoring start");
            return Ok(());
        }

        // Reap the workers of a session that ended on its own.
        self.capture.stop(self.stop_timeout());

        let camera = self
            .backend
            .open_camera(&self.video_source, self.config.fps)?;
        let microphone = self.open_microphone();

        self.shared.latest.clear();
        self.capture.start();
        self.shared.set_state(CaptureState::Capturing {
            armed: self.shared.is_armed(),
        });

        if let Err(e) = self.spawn_workers(camera, microphone) {
            error!("Failed to start capture: {}", e);
            self.capture.stop(self.stop_timeout());
            self.shared.set_state(CaptureState::Idle);
            return Err(e);
        }

        info!("Capture started");
        Ok(())
    }

    fn open_microphone(&self) -> Option<Box<dyn AudioInput>> {
        let source = self.audio_source.as_ref()?;
        match self
            .backend
            .open_microphone(source, self.config.audio_format)
        {
            Ok(microphone) => Some(microphone),
            Err(e) => {
                warn!("Microphone unavailable, capturing without audio: {}", e);
                self.shared.events.send(MediaEvent::Error {
                    recoverable: true,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn spawn_workers(
        &self,
        camera: Box<dyn FrameSource>,
        microphone: Option<Box<dyn AudioInput>>,
    ) -> EngineResult<()> {
        let fps = self.config.fps;

        let shared = Arc::clone(&self.shared);
        self.capture
            .spawn("video-capture", move |signal| {
                capture_loop(&shared, camera, fps, &signal)
            })
            .map_err(EngineError::Spawn)?;

        let shared = Arc::clone(&self.shared);
        let size = self.size;
        self.capture
            .spawn("video-preview", move |signal| {
                preview_loop(&shared, size, fps, &signal)
            })
            .map_err(EngineError::Spawn)?;

        if let Some(microphone) = microphone {
            let shared = Arc::clone(&self.shared);
            self.capture
                .spawn("audio-capture", move |signal| {
                    microphone_loop(&shared, microphone, &signal)
                })
                .map_err(EngineError::Spawn)?;
        }

        Ok(())
    }

    /// Arm recording. The open video file is reused unless `output` names a
    /// different one, in which case the old file is closed first.
    #[instrument(name = "recorder_start_recording", skip(self))]
    pub fn start_recording(&self, output: Option<PathBuf>) -> EngineResult<()> {
        let _op = self.op_lock.lock();
        let path = {
            let mut video_path = self.video_path.lock();
            if let Some(output) = output {
                *video_path = output;
            }
            video_path.clone()
        };

        {
            let mut sink = self.shared.video_sink.lock();
            if !sink.as_ref().is_some_and(|open| open.path == path) {
                if let Some(mut previous) = sink.take() {
                    close_video_sink(&mut previous)?;
                }

                let config = VideoEncoderConfig {
                    width: self.video_source.width,
                    height: self.video_source.height,
                    fps: self.config.fps,
                };
                let new_sink = self.backend.create_video_sink(&path, config)?;
                info!(path = %path.display(), sink = new_sink.name(), "Recording to new file");
                self.shared.frames_recorded.store(0, Ordering::Relaxed);
                *sink = Some(OpenSink {
                    path,
                    sink: new_sink,
                });
            }
        }

        self.shared.set_armed(true);
        Ok(())
    }

    /// Disarm recording. Preview continues and the video file stays open.
    #[instrument(name = "recorder_stop_recording", skip(self))]
    pub fn stop_recording(&self) {
        let _op = self.op_lock.lock();
        self.shared.set_armed(false);
    }

    /// Stop all loops, then close the video file and write the recorded
    /// audio. Safe to call when not capturing.
    #[instrument(name = "recorder_stop_capture", skip(self))]
    pub fn stop_capture(&self) -> EngineResult<()> {
        let _op = self.op_lock.lock();
        self.capture.stop(self.stop_timeout());

        self.shared.armed.store(false, Ordering::SeqCst);
        self.shared.set_state(CaptureState::Idle);
        self.shared.latest.clear();

        self.close_sinks()
    }

    /// Same as [`VideoRecorder::stop_capture`].
    pub fn close_video_recording(&self) -> EngineResult<()> {
        self.stop_capture()
    }

    fn close_sinks(&self) -> EngineResult<()> {
        let mut result = Ok(());

        if let Some(mut open) = self.shared.video_sink.lock().take() {
            if let Err(e) = close_video_sink(&mut open) {
                result = Err(e);
            }
        }

        let chunks = std::mem::take(&mut *self.shared.audio_chunks.lock());
        if !chunks.is_empty() {
            if let Err(e) = self.write_audio(&chunks) {
                error!("Failed to write recorded audio: {}", e);
                result = result.and(Err(e));
            }
        }

        result
    }

    fn write_audio(&self, chunks: &[Bytes]) -> EngineResult<()> {
        let mut sink = WavSink::create(&self.config.audio_path, &self.config.audio_format)?;
        for chunk in chunks {
            sink.write_chunk(chunk)?;
        }
        let samples = sink.finalize()?;
        info!(
            path = %self.config.audio_path.display(),
            chunks = chunks.len(),
            samples,
            "Recorded audio written"
        );
        Ok(())
    }

    /// Stop capture and multiplex the recorded video and audio into
    /// `output`. Returns false when the merge failed; the recorded files are
    /// only deleted after a successful merge.
    #[instrument(name = "recorder_merge", skip(self))]
    pub fn merge_sources(&self, output: &Path, delete_sources: bool) -> bool {
        if let Err(e) = self.stop_capture() {
            warn!("Closing recordings before merge failed: {}", e);
        }

        let video = self.video_path();
        let success = Transcoder::from_tools(&self.config.tools).merge(
            &video,
            &self.config.audio_path,
            output,
            delete_sources,
        );

        self.shared.events.send(MediaEvent::MergeFinished {
            output: output.to_path_buf(),
            success,
        });
        success
    }

    pub fn state(&self) -> CaptureState {
        *self.shared.state.lock()
    }

    pub fn is_capturing(&self) -> bool {
        self.state().is_capturing()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_armed()
    }

    /// Frames appended to the current video file.
    pub fn frames_recorded(&self) -> u64 {
        self.shared.frames_recorded.load(Ordering::Relaxed)
    }

    /// Path of the current video file.
    pub fn video_path(&self) -> PathBuf {
        self.video_path.lock().clone()
    }

    pub fn audio_path(&self) -> &Path {
        &self.config.audio_path
    }

    pub fn video_source(&self) -> &VideoSource {
        &self.video_source
    }

    pub fn audio_source(&self) -> Option<&AudioSource> {
        self.audio_source.as_ref()
    }

    /// Capture worker threads still running.
    pub fn live_workers(&self) -> usize {
        self.capture.live_workers()
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_secs_f64(2.0 / self.config.fps) + Duration::from_secs(1)
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capture() {
            warn!("Failed to close recordings on drop: {}", e);
        }
    }
}

fn close_video_sink(open: &mut OpenSink) -> EngineResult<()> {
    let frames = open.sink.frames_written();
    open.sink.close().map_err(|e| {
        error!(path = %open.path.display(), "Failed to close video file: {}", e);
        EngineError::from(e)
    })?;
    info!(path = %open.path.display(), frames, "Video file closed");
    Ok(())
}

fn capture_loop(shared: &Shared, mut camera: Box<dyn FrameSource>, fps: f64, signal: &StopSignal) {
    let mut ticker = Ticker::from_fps(fps);
    debug!(fps, "Capture loop starting");

    while signal.is_running() {
        match camera.next_frame() {
            Ok(Some(frame)) => {
                if shared.is_armed() {
                    if let Err(e) = shared.record(&frame) {
                        shared.fail(
                            signal,
                            StopReason::SinkFailed {
                                message: e.to_string(),
                            },
                        );
                        break;
                    }
                }
                shared.latest.publish(frame);
            }
            Ok(None) => {
                shared.fail(
                    signal,
                    StopReason::DeviceLost {
                        message: "camera stopped delivering frames".to_string(),
                    },
                );
                break;
            }
            Err(e) if e.is_transient() => warn!("Dropped camera frame: {}", e),
            Err(e) => {
                shared.fail(
                    signal,
                    StopReason::DeviceLost {
                        message: e.to_string(),
                    },
                );
                break;
            }
        }

        ticker.wait();
    }

    debug!("Capture loop stopped");
}

fn preview_loop(shared: &Shared, size: DisplaySize, fps: f64, signal: &StopSignal) {
    let mut ticker = Ticker::from_fps(fps);
    let mut seen = 0;

    while signal.is_running() {
        if let Some((version, frame)) = shared.latest.newer_than(seen) {
            seen = version;
            if shared.display.is_visible() {
                match frame.resized(size) {
                    Ok(sized) => shared.display.render(&sized),
                    Err(e) => warn!("Preview frame dropped: {}", e),
                }
            }
        }
        ticker.wait();
    }

    debug!("Preview loop stopped");
}

fn microphone_loop(shared: &Shared, mut microphone: Box<dyn AudioInput>, signal: &StopSignal) {
    debug!("Microphone loop starting");

    while signal.is_running() {
        match microphone.read_chunk() {
            Ok(chunk) => {
                if shared.is_armed() {
                    shared.audio_chunks.lock().push(chunk.data);
                }
            }
            Err(e) => {
                error!("Microphone stopped: {}", e);
                shared.events.send(MediaEvent::Error {
                    recoverable: true,
                    message: format!("microphone stopped: {e}"),
                });
                break;
            }
        }
    }

    debug!("Microphone loop stopped");
}
