//! Buffered video player.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use reel_audio::{AudioOutput, AudioTrackCache, AudioTrackLoader, RodioAudioOutput};
use reel_capture::{FfmpegReader, Frame, FrameSource};
use reel_encoder::Transcoder;
use reel_ipc::{
    check_fps, ClipRange, DisplaySize, MediaEvent, PlaybackState, PlayerConfig, StopReason,
    ToolConfig,
};

use crate::clock::{next_position, resync_chunk_index, skip_frames, start_position, Advance};
use crate::display::{DisplayTarget, PlayControl};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::frame_store::FrameStore;
use crate::lifecycle::{Lifecycle, StopSignal};
use crate::loader::{FirstFrameHook, FrameLoader};
use crate::ticker::Ticker;
use crate::EngineResult;

const AUDIO_POLL_INTERVAL: Duration = Duration::from_millis(5);
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Audio track played alongside the video.
pub struct PlayerAudio {
    cache: Arc<AudioTrackCache>,
    output: Arc<Mutex<Box<dyn AudioOutput>>>,
    _loader: AudioTrackLoader,
}

impl PlayerAudio {
    pub fn new(loader: AudioTrackLoader, output: Box<dyn AudioOutput>) -> Self {
        Self {
            cache: loader.cache(),
            output: Arc::new(Mutex::new(output)),
            _loader: loader,
        }
    }

    pub fn cache(&self) -> &Arc<AudioTrackCache> {
        &self.cache
    }
}

/// Optional collaborators of a player.
#[derive(Default)]
pub struct Attachments {
    /// Play/pause indicator, kept in sync with the playback state.
    pub control: Option<Arc<dyn PlayControl>>,

    /// Event channel to the shell.
    pub events: Option<Sender<MediaEvent>>,

    /// Audio track. [`VideoPlayer::open`] fills this in when audio is enabled.
    pub audio: Option<PlayerAudio>,
}

/// State shared between the player handle, its display loop and the loader.
struct Shared {
    store: Arc<FrameStore>,
    display: Arc<dyn DisplayTarget>,
    control: Option<Arc<dyn PlayControl>>,
    events: EventSink,
    state: Mutex<PlaybackState>,
    position: AtomicUsize,
    pending_skip: Mutex<Option<isize>>,
    clip: Mutex<Option<ClipRange>>,
}

impl Shared {
    fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    fn show(&self, frame: &Frame, position: usize) {
        if self.display.is_visible() {
            self.display.render(frame);
        }
        self.events.send(MediaEvent::PositionChanged { frame: position });
    }

    /// Move to `frame`, clamped to the loaded frontier, and show it.
    fn seek(&self, frame: usize) {
        let Some(frontier) = self.store.frontier() else {
            debug!(frame, "No frames loaded yet, ignoring seek");
            return;
        };
        let target = frame.min(frontier);
        self.position.store(target, Ordering::SeqCst);
        if let Some(frame) = self.store.frame_at(target) {
            self.show(&frame, target);
        }
    }

    /// Show the first loaded frame unless playback already moved on.
    fn show_if_parked(&self, frame: &Frame) {
        let state = self.state.lock();
        if !state.is_playing() && self.position() == 0 {
            self.show(frame, 0);
        }
    }

    fn set_control(&self, playing: bool) {
        if let Some(control) = &self.control {
            control.set_playing(playing);
        }
    }

    /// Returns false when already in `new_state`.
    fn transition_to(&self, new_state: PlaybackState) -> bool {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = new_state;
            previous
        };
        if previous == new_state {
            return false;
        }

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );
        self.events.send(MediaEvent::PlaybackStateChanged {
            previous,
            current: new_state,
        });
        true
    }

    fn finish(&self, reason: StopReason) {
        if !self.transition_to(PlaybackState::Stopped) {
            return;
        }
        self.set_control(false);
        info!(reason = %reason.message(), position = self.position(), "Playback stopped");
        self.events.send(MediaEvent::PlaybackStopped { reason });
    }
}

/// Plays a video while it is still being decoded.
///
/// Frames are decoded and resized once by a background loader; playback
/// walks the stored frames at the source frame rate, holding on the newest
/// loaded frame if it catches up with the loader. Pausing is stopping at the
/// current position.
pub struct VideoPlayer {
    shared: Arc<Shared>,
    loader: FrameLoader,
    audio: Option<PlayerAudio>,
    playback: Lifecycle,
    op_lock: Mutex<()>,
    fps: f64,
    skip: usize,
    size: DisplaySize,
}

impl VideoPlayer {
    /// Start loading `source` and show its first frame as soon as it is
    /// decoded.
    #[instrument(name = "player_new", skip_all)]
    pub fn new(
        source: Box<dyn FrameSource>,
        display: Arc<dyn DisplayTarget>,
        config: &PlayerConfig,
        attachments: Attachments,
    ) -> EngineResult<Self> {
        config.validate()?;

        let info = source.info().clone();
        check_fps(info.fps)
            .map_err(|_| EngineError::InvalidSource(format!("frame rate {}", info.fps)))?;

        let size = config
            .display_size
            .fit(info.width, info.height, config.keep_ratio);
        let skip = skip_frames(config.skip_seconds, info.fps);

        let shared = Arc::new(Shared {
            store: Arc::new(FrameStore::new(info.frame_count)),
            display,
            control: attachments.control,
            events: EventSink::new(attachments.events),
            state: Mutex::new(PlaybackState::Stopped),
            position: AtomicUsize::new(0),
            pending_skip: Mutex::new(None),
            clip: Mutex::new(None),
        });
        shared.set_control(false);

        let hook: FirstFrameHook = {
            let shared = Arc::clone(&shared);
            Box::new(move |frame: &Frame| shared.show_if_parked(frame))
        };
        let loader = FrameLoader::spawn(
            source,
            Arc::clone(&shared.store),
            size,
            shared.events.clone(),
            Some(hook),
        )?;

        info!(
            fps = info.fps,
            width = size.width,
            height = size.height,
            skip,
            audio = attachments.audio.is_some(),
            "Video player ready"
        );

        Ok(Self {
            shared,
            loader,
            audio: attachments.audio,
            playback: Lifecycle::new("playback"),
            op_lock: Mutex::new(()),
            fps: info.fps,
            skip,
            size,
        })
    }

    /// Open a video file. With audio enabled the soundtrack is read from the
    /// `.wav` file next to the video, extracted first if missing; any audio
    /// failure leaves the player silent.
    #[instrument(name = "player_open", skip(display, config, attachments))]
    pub fn open(
        path: &Path,
        display: Arc<dyn DisplayTarget>,
        config: &PlayerConfig,
        mut attachments: Attachments,
    ) -> EngineResult<Self> {
        config.validate()?;
        let source = FfmpegReader::open_file(&config.tools, path)?;

        if config.audio && attachments.audio.is_none() {
            match open_audio(path, config) {
                Ok(audio) => attachments.audio = Some(audio),
                Err(e) => {
                    warn!("Audio disabled: {}", e);
                    EventSink::new(attachments.events.clone()).send(MediaEvent::AudioDisabled {
                        message: e.to_string(),
                    });
                }
            }
        }

        Self::new(Box::new(source), display, config, attachments)
    }

    /// Start playback from the current position. Rewinds first when parked
    /// on the last frame (or the end of the clip). No-op while playing.
    #[instrument(name = "player_play", skip(self))]
    pub fn play(&self) -> EngineResult<()> {
        let _op = self.op_lock.lock();
        if self.is_playing() {
            debug!("Already playing, ignoring play");
            return Ok(());
        }

        // Reap the workers of a run that ended on its own.
        self.playback.stop(self.stop_timeout());

        let clip = *self.shared.clip.lock();
        let position = start_position(self.position(), self.shared.store.last_index(), clip);
        self.shared.position.store(position, Ordering::SeqCst);
        self.shared.pending_skip.lock().take();

        self.playback.start();
        self.shared.transition_to(PlaybackState::Playing);
        self.shared.set_control(true);

        if let Err(e) = self.spawn_workers(position) {
            error!("Failed to start playback: {}", e);
            self.playback.stop(self.stop_timeout());
            self.shared.finish(StopReason::UserRequested);
            return Err(e);
        }

        info!(position, "Playback started");
        Ok(())
    }

    fn spawn_workers(&self, position: usize) -> EngineResult<()> {
        let shared = Arc::clone(&self.shared);
        let fps = self.fps;
        self.playback
            .spawn("video-playback", move |signal| {
                playback_loop(&shared, fps, &signal)
            })
            .map_err(EngineError::Spawn)?;

        if let Some(audio) = &self.audio {
            let chunk = resync_chunk_index(
                audio.cache.total_chunks_estimate(),
                position,
                self.shared.store.total_frames(),
            );
            let cache = Arc::clone(&audio.cache);
            let output = Arc::clone(&audio.output);
            self.playback
                .spawn("audio-playback", move |signal| {
                    audio_loop(&cache, &output, chunk, &signal)
                })
                .map_err(EngineError::Spawn)?;
        }

        Ok(())
    }

    /// Stop playback at the current position. Returns once the display and
    /// audio loops have exited.
    #[instrument(name = "player_stop", skip(self))]
    pub fn stop(&self) {
        let _op = self.op_lock.lock();
        self.playback.stop(self.stop_timeout());
        self.shared.finish(StopReason::UserRequested);
    }

    pub fn pause(&self) {
        self.stop();
    }

    /// Play when stopped, stop when playing.
    pub fn toggle(&self) -> EngineResult<()> {
        if self.is_playing() {
            self.stop();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn skip_video_forward(&self) {
        self.skip_by(self.skip as isize);
    }

    pub fn skip_video_backward(&self) {
        self.skip_by(-(self.skip as isize));
    }

    fn skip_by(&self, delta: isize) {
        let state = self.shared.state.lock();
        if state.is_playing() {
            *self.shared.pending_skip.lock() = Some(delta);
            return;
        }
        self.shared.seek(self.position().saturating_add_signed(delta));
    }

    /// Seek to `frame`. While stopped the frame is shown at once (clamped to
    /// what is loaded); while playing the move is applied on the next tick.
    pub fn load_frame(&self, frame: usize) {
        let state = self.shared.state.lock();
        if state.is_playing() {
            let delta = frame as isize - self.position() as isize;
            *self.shared.pending_skip.lock() = Some(delta);
            return;
        }
        self.shared.seek(frame);
    }

    /// Restrict playback to `[start, end)`, or lift the restriction.
    pub fn set_clip(&self, clip: Option<ClipRange>) {
        debug!(?clip, "Clip range set");
        *self.shared.clip.lock() = clip;
    }

    pub fn clip(&self) -> Option<ClipRange> {
        *self.shared.clip.lock()
    }

    /// Stop decoding further frames.
    pub fn cancel_loading(&self) {
        self.loader.cancel_loading();
    }

    /// Block until loading has finished or `timeout` elapses.
    pub fn wait_loaded(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.loader.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(LOAD_POLL_INTERVAL);
        }
        true
    }

    pub fn position(&self) -> usize {
        self.shared.position()
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.state.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn frame_count_loaded(&self) -> usize {
        self.shared.store.frame_count_loaded()
    }

    pub fn frame_at(&self, index: usize) -> Option<Frame> {
        self.shared.store.frame_at(index)
    }

    pub fn is_loading(&self) -> bool {
        !self.loader.is_finished()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frames moved by one skip.
    pub fn skip_frames(&self) -> usize {
        self.skip
    }

    pub fn display_size(&self) -> DisplaySize {
        self.size
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.is_some()
    }

    /// Playback worker threads still running.
    pub fn live_workers(&self) -> usize {
        self.playback.live_workers()
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_secs_f64(2.0 / self.fps) + Duration::from_secs(1)
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.playback.stop(self.stop_timeout());
    }
}

fn open_audio(path: &Path, config: &PlayerConfig) -> EngineResult<PlayerAudio> {
    let wav = side_track(path, &config.tools)?;
    let loader = AudioTrackLoader::spawn(&wav, config.audio_chunk_size)?;
    let format = loader
        .cache()
        .format()
        .ok_or_else(|| EngineError::InvalidSource("audio format unknown".to_string()))?;
    let output = RodioAudioOutput::open(&format)?;

    Ok(PlayerAudio::new(loader, Box::new(output)))
}

/// The `.wav` file next to `path`, extracted when missing. A failed
/// extraction leaves no file behind.
fn side_track(path: &Path, tools: &ToolConfig) -> EngineResult<PathBuf> {
    let wav = path.with_extension("wav");
    if wav.exists() {
        return Ok(wav);
    }

    if let Err(e) = Transcoder::from_tools(tools).extract_audio(path, &wav) {
        match std::fs::remove_file(&wav) {
            Ok(()) => debug!(wav = %wav.display(), "Removed partial audio track"),
            Err(remove) if remove.kind() == ErrorKind::NotFound => {}
            Err(remove) => {
                warn!(wav = %wav.display(), "Failed to remove partial audio track: {}", remove)
            }
        }
        return Err(e.into());
    }
    Ok(wav)
}

fn playback_loop(shared: &Shared, fps: f64, signal: &StopSignal) {
    let mut ticker = Ticker::from_fps(fps);
    let mut shown: Option<usize> = None;

    debug!(fps, "Playback loop starting");

    let reason = loop {
        if !signal.is_running() {
            break None;
        }

        let position = shared.position();
        if shown != Some(position) {
            if let Some(frame) = shared.store.frame_at(position) {
                shared.show(&frame, position);
                shown = Some(position);
            }
        }

        ticker.wait();
        if !signal.is_running() {
            break None;
        }

        let Some(frontier) = shared.store.frontier() else {
            if shared.store.is_complete() {
                break Some(StopReason::EndOfVideo);
            }
            continue;
        };

        let pending = shared.pending_skip.lock().take();
        let clip = *shared.clip.lock();
        match next_position(position, pending, frontier, shared.store.is_complete(), clip) {
            Advance::Show(next) => shared.position.store(next, Ordering::SeqCst),
            Advance::Stop(reason) => break Some(reason),
        }
    };

    if let Some(reason) = reason {
        signal.signal_stop();
        shared.finish(reason);
    }
    debug!("Playback loop stopped");
}

fn audio_loop(
    cache: &AudioTrackCache,
    output: &Mutex<Box<dyn AudioOutput>>,
    mut index: usize,
    signal: &StopSignal,
) {
    let mut output = output.lock();
    debug!(chunk = index, "Audio playback starting");

    while signal.is_running() {
        match cache.chunk_at(index) {
            Some(chunk) => {
                if let Err(e) = output.write(&chunk) {
                    warn!("Audio output failed: {}", e);
                    break;
                }
                index += 1;
            }
            None if cache.is_finished() => {
                debug!(chunk = index, "End of audio track");
                break;
            }
            None => thread::sleep(AUDIO_POLL_INTERVAL),
        }
    }

    if !signal.is_running() {
        output.clear();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use crossbeam_channel::{unbounded, Receiver};

    use reel_audio::{AudioResult, WavSink};
    use reel_capture::MemorySource;
    use reel_ipc::AudioFormat;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[derive(Default)]
    struct RecordingDisplay {
        rendered: Mutex<Vec<u64>>,
        hidden: bool,
    }

    impl RecordingDisplay {
        fn rendered(&self) -> Vec<u64> {
            self.rendered.lock().clone()
        }
    }

    impl DisplayTarget for RecordingDisplay {
        fn render(&self, frame: &Frame) {
            self.rendered.lock().push(frame.sequence);
        }

        fn is_visible(&self) -> bool {
            !self.hidden
        }
    }

    #[derive(Default)]
    struct RecordingControl {
        states: Mutex<Vec<bool>>,
    }

    impl PlayControl for RecordingControl {
        fn set_playing(&self, playing: bool) {
            self.states.lock().push(playing);
        }
    }

    struct RecordingOutput {
        written: Arc<Mutex<Vec<Bytes>>>,
        cleared: Arc<AtomicUsize>,
    }

    impl AudioOutput for RecordingOutput {
        fn write(&mut self, pcm: &[u8]) -> AudioResult<()> {
            self.written.lock().push(Bytes::copy_from_slice(pcm));
            Ok(())
        }

        fn clear(&mut self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frames(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::new(Bytes::from(vec![i as u8; 4 * 4 * 3]), 4, 4, 0))
            .collect()
    }

    fn config(skip_seconds: f64) -> PlayerConfig {
        PlayerConfig {
            display_size: DisplaySize::new(4, 4),
            skip_seconds,
            audio: false,
            ..Default::default()
        }
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while !condition() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        true
    }

    struct Fixture {
        player: VideoPlayer,
        display: Arc<RecordingDisplay>,
        control: Arc<RecordingControl>,
        events: Receiver<MediaEvent>,
    }

    fn fixture(count: usize, fps: f64, skip_seconds: f64) -> Fixture {
        fixture_with(count, fps, skip_seconds, RecordingDisplay::default(), None)
    }

    fn fixture_with(
        count: usize,
        fps: f64,
        skip_seconds: f64,
        display: RecordingDisplay,
        audio: Option<PlayerAudio>,
    ) -> Fixture {
        let display = Arc::new(display);
        let control = Arc::new(RecordingControl::default());
        let (tx, events) = unbounded();
        let player = VideoPlayer::new(
            Box::new(MemorySource::new(fps, frames(count))),
            display.clone(),
            &config(skip_seconds),
            Attachments {
                control: Some(control.clone()),
                events: Some(tx),
                audio,
            },
        )
        .unwrap();
        assert!(player.wait_loaded(TIMEOUT));
        Fixture {
            player,
            display,
            control,
            events,
        }
    }

    fn stop_reasons(events: &Receiver<MediaEvent>) -> Vec<StopReason> {
        events
            .try_iter()
            .filter_map(|e| match e {
                MediaEvent::PlaybackStopped { reason } => Some(reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_frame_shown_after_load() {
        let f = fixture(5, 10.0, 1.0);
        assert_eq!(f.display.rendered(), vec![0]);
        assert_eq!(f.player.frame_count_loaded(), 5);
        assert!(!f.player.is_loading());
    }

    #[test]
    fn test_rejects_zero_frame_rate() {
        let result = VideoPlayer::new(
            Box::new(MemorySource::new(0.0, frames(3))),
            Arc::new(RecordingDisplay::default()),
            &config(1.0),
            Attachments::default(),
        );
        assert!(matches!(result, Err(EngineError::InvalidSource(_))));
    }

    #[test]
    fn test_rejects_vanishing_frame_rate() {
        for fps in [1e-300, f64::MIN_POSITIVE, f64::NAN] {
            let result = VideoPlayer::new(
                Box::new(MemorySource::new(fps, frames(3))),
                Arc::new(RecordingDisplay::default()),
                &config(1.0),
                Attachments::default(),
            );
            assert!(matches!(result, Err(EngineError::InvalidSource(_))));
        }
    }

    #[test]
    fn test_skip_forward_while_stopped() {
        let f = fixture(100, 10.0, 2.0);
        assert_eq!(f.player.skip_frames(), 20);

        f.player.skip_video_forward();
        assert_eq!(f.player.position(), 20);
        assert_eq!(f.display.rendered().last(), Some(&20));
    }

    #[test]
    fn test_skip_and_seek_are_clamped() {
        let f = fixture(100, 10.0, 2.0);

        f.player.load_frame(95);
        f.player.skip_video_forward();
        assert_eq!(f.player.position(), 99);

        f.player.load_frame(5);
        f.player.skip_video_backward();
        assert_eq!(f.player.position(), 0);

        f.player.load_frame(500);
        assert_eq!(f.player.position(), 99);
    }

    #[test]
    fn test_hidden_display_is_not_rendered() {
        let display = RecordingDisplay {
            hidden: true,
            ..Default::default()
        };
        let f = fixture_with(30, 10.0, 1.0, display, None);

        f.player.skip_video_forward();
        assert_eq!(f.player.position(), 10);
        assert!(f.display.rendered().is_empty());
        assert!(f
            .events
            .try_iter()
            .any(|e| matches!(e, MediaEvent::PositionChanged { frame: 10 })));
    }

    #[test]
    fn test_plays_to_end_and_stops() {
        let f = fixture(20, 200.0, 1.0);

        f.player.play().unwrap();
        assert!(wait_for(|| !f.player.is_playing()));
        assert!(wait_for(|| f.player.live_workers() == 0));

        assert_eq!(f.player.position(), 19);
        assert_eq!(f.display.rendered().last(), Some(&19));
        assert_eq!(*f.control.states.lock(), vec![false, true, false]);
        assert_eq!(stop_reasons(&f.events), vec![StopReason::EndOfVideo]);
    }

    #[test]
    fn test_play_at_last_frame_rewinds() {
        let f = fixture(50, 100.0, 1.0);
        f.player.load_frame(49);
        let before = f.display.rendered().len();

        f.player.play().unwrap();
        assert!(wait_for(|| f.display.rendered().len() > before));
        f.player.stop();

        assert_eq!(f.display.rendered()[before], 0);
    }

    #[test]
    fn test_clip_halts_before_end() {
        let f = fixture(50, 200.0, 1.0);
        f.player.set_clip(Some(ClipRange::new(10, 15).unwrap()));
        let before = f.display.rendered().len();

        f.player.play().unwrap();
        assert!(wait_for(|| !f.player.is_playing()));

        assert_eq!(f.display.rendered()[before..], [10, 11, 12, 13, 14]);
        assert_eq!(f.player.position(), 14);
        assert_eq!(stop_reasons(&f.events), vec![StopReason::ClipEnd]);

        // Parked on the clip's last frame: the next play starts over.
        f.player.play().unwrap();
        assert!(wait_for(|| !f.player.is_playing()));
        assert_eq!(f.display.rendered()[before + 5], 10);
    }

    #[test]
    fn test_stop_leaves_no_workers() {
        let f = fixture(100, 100.0, 1.0);

        f.player.play().unwrap();
        assert!(wait_for(|| f.player.position() > 2));
        f.player.stop();

        assert_eq!(f.player.live_workers(), 0);
        assert_eq!(f.player.state(), PlaybackState::Stopped);
        assert_eq!(stop_reasons(&f.events), vec![StopReason::UserRequested]);

        let position = f.player.position();
        let rendered = f.display.rendered().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(f.player.position(), position);
        assert_eq!(f.display.rendered().len(), rendered);

        // Stopping again is a no-op.
        f.player.stop();
        assert_eq!(stop_reasons(&f.events), vec![]);
    }

    #[test]
    fn test_toggle() {
        let f = fixture(100, 50.0, 1.0);

        f.player.toggle().unwrap();
        assert!(f.player.is_playing());
        f.player.toggle().unwrap();
        assert!(!f.player.is_playing());
        assert_eq!(f.player.live_workers(), 0);
    }

    #[test]
    fn test_seek_while_playing_applies_on_next_tick() {
        let f = fixture(100, 20.0, 1.0);

        f.player.play().unwrap();
        f.player.load_frame(60);
        assert!(wait_for(|| f.player.position() >= 60));
        f.player.stop();

        let rendered = f.display.rendered();
        assert!(rendered.contains(&60));
        assert!(!rendered.contains(&30));
    }

    #[test]
    fn test_skip_while_playing_applies_on_next_tick() {
        let f = fixture(100, 20.0, 2.0);

        f.player.play().unwrap();
        f.player.skip_video_forward();
        assert!(wait_for(|| f.player.position() >= 40));
        f.player.stop();

        assert!(!f.display.rendered().contains(&20));
    }

    fn write_track(name: &str, chunks: usize, chunk_size: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "reel-player-{}-{}.wav",
            name,
            std::process::id()
        ));
        let format = AudioFormat {
            sample_rate: 8000,
            channels: 1,
            chunk_size,
        };
        let mut sink = WavSink::create(&path, &format).unwrap();
        for chunk in 0..chunks {
            let pcm: Vec<u8> = (0..chunk_size)
                .flat_map(|_| (chunk as i16).to_le_bytes())
                .collect();
            sink.write_chunk(&pcm).unwrap();
        }
        sink.finalize().unwrap();
        path
    }

    #[test]
    fn test_audio_resumes_at_matching_chunk() {
        let path = write_track("resync", 10, 4);
        let loader = AudioTrackLoader::spawn(&path, 4).unwrap();
        let cache = loader.cache();
        assert!(wait_for(|| cache.is_finished()));
        assert_eq!(cache.chunks_loaded(), 10);

        let written = Arc::new(Mutex::new(Vec::new()));
        let cleared = Arc::new(AtomicUsize::new(0));
        let audio = PlayerAudio::new(
            loader,
            Box::new(RecordingOutput {
                written: Arc::clone(&written),
                cleared: Arc::clone(&cleared),
            }),
        );
        let f = fixture_with(100, 50.0, 1.0, RecordingDisplay::default(), Some(audio));
        assert!(f.player.audio_enabled());

        f.player.load_frame(50);
        f.player.play().unwrap();
        assert!(wait_for(|| written.lock().len() == 5));
        f.player.stop();
        // Queued audio is dropped so the next play starts at the resynced chunk.
        assert_eq!(cleared.load(Ordering::SeqCst), 1);

        let first = written.lock()[0].clone();
        assert_eq!(i16::from_le_bytes([first[0], first[1]]), 5);
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> ToolConfig {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        ToolConfig {
            ffmpeg: script,
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_extraction_leaves_no_side_track() {
        let dir = std::env::temp_dir().join(format!("reel-side-track-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let video = dir.join("clip.mp4");
        let wav = dir.join("clip.wav");

        // Writes half a file to its last argument, then fails.
        let broken = fake_ffmpeg(&dir, r#"for last; do :; done; echo partial > "$last"; exit 1"#);
        assert!(side_track(&video, &broken).is_err());
        assert!(!wav.exists());

        let working = fake_ffmpeg(&dir, r#"for last; do :; done; echo track > "$last""#);
        assert_eq!(side_track(&video, &working).unwrap(), wav);
        assert!(wav.exists());

        // An existing track is reused without running the transcoder.
        assert_eq!(side_track(&video, &broken).unwrap(), wav);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
