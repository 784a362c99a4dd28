//! Argument parsing and subcommands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use reel_audio::list_audio_sources;
use reel_capture::list_video_sources;
use reel_encoder::Transcoder;
use reel_engine::{first_available, serve_player, Attachments, VideoPlayer, VideoRecorder};
use reel_ipc::{
    event_channel, player_command_channel, PlayerCommand, PlayerConfig, RecorderConfig,
    ToolConfig,
};

use crate::config;
use crate::shell::{spawn_event_logger, LoggingControl, LoggingDisplay};

const USAGE: &str = "Usage:
  reel devices [--config <file>]
  reel play <video> [--seconds <n>] [--config <file>]
  reel record <video-index> <audio-index|none> <output> [--seconds <n>] [--config <file>]
  reel merge <video> <audio> <output> [--delete]";

const DEFAULT_RECORD_SECONDS: f64 = 5.0;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Devices {
        config: Option<PathBuf>,
    },
    Play {
        path: PathBuf,
        seconds: Option<f64>,
        config: Option<PathBuf>,
    },
    Record {
        video_index: u32,
        audio_index: Option<u32>,
        output: PathBuf,
        seconds: f64,
        config: Option<PathBuf>,
    },
    Merge {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
        delete_sources: bool,
    },
    Help,
}

/// Options shared by the subcommands.
#[derive(Default)]
struct Flags {
    seconds: Option<f64>,
    config: Option<PathBuf>,
    delete: bool,
}

fn parse_flags(args: &[String], allowed: &[&str]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut idx = 0;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if !allowed.contains(&flag) {
            bail!("Unrecognised flag: {flag}");
        }
        match flag {
            "--seconds" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| anyhow!("--seconds requires a value"))?
                    .parse::<f64>()
                    .with_context(|| "--seconds must be a number".to_string())?;
                if !value.is_finite() || value <= 0.0 {
                    bail!("--seconds must be positive");
                }
                flags.seconds = Some(value);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| anyhow!("--config requires a value"))?;
                flags.config = Some(PathBuf::from(value));
            }
            "--delete" => flags.delete = true,
            _ => bail!("Unrecognised flag: {flag}"),
        }
        idx += 1;
    }
    Ok(flags)
}

fn positional<'a>(args: &'a [String], count: usize) -> Result<&'a [String]> {
    if args.len() < 2 + count {
        bail!("{USAGE}");
    }
    Ok(&args[2..2 + count])
}

/// Parse the full argument list, program name included.
pub fn parse(args: &[String]) -> Result<Command> {
    match args.get(1).map(|s| s.as_str()) {
        Some("devices") => {
            let flags = parse_flags(&args[2..], &["--config"])?;
            Ok(Command::Devices {
                config: flags.config,
            })
        }
        Some("play") => {
            let values = positional(args, 1)?;
            let flags = parse_flags(&args[3..], &["--seconds", "--config"])?;
            Ok(Command::Play {
                path: PathBuf::from(&values[0]),
                seconds: flags.seconds,
                config: flags.config,
            })
        }
        Some("record") => {
            let values = positional(args, 3)?;
            let video_index = values[0]
                .parse::<u32>()
                .with_context(|| "video index must be a non-negative integer".to_string())?;
            let audio_index = match values[1].as_str() {
                "none" => None,
                value => Some(value.parse::<u32>().with_context(|| {
                    "audio index must be a non-negative integer or 'none'".to_string()
                })?),
            };
            let flags = parse_flags(&args[5..], &["--seconds", "--config"])?;
            Ok(Command::Record {
                video_index,
                audio_index,
                output: PathBuf::from(&values[2]),
                seconds: flags.seconds.unwrap_or(DEFAULT_RECORD_SECONDS),
                config: flags.config,
            })
        }
        Some("merge") => {
            let values = positional(args, 3)?;
            let flags = parse_flags(&args[5..], &["--delete"])?;
            Ok(Command::Merge {
                video: PathBuf::from(&values[0]),
                audio: PathBuf::from(&values[1]),
                output: PathBuf::from(&values[2]),
                delete_sources: flags.delete,
            })
        }
        Some("help") | Some("--help") | Some("-h") | None => Ok(Command::Help),
        Some(other) => bail!("Unknown command: {other}\n{USAGE}"),
    }
}

pub fn run(args: &[String]) -> Result<()> {
    match parse(args)? {
        Command::Devices { config } => run_devices(config.as_deref()),
        Command::Play {
            path,
            seconds,
            config,
        } => run_play(&path, seconds, config.as_deref()),
        Command::Record {
            video_index,
            audio_index,
            output,
            seconds,
            config,
        } => run_record(video_index, audio_index, &output, seconds, config.as_deref()),
        Command::Merge {
            video,
            audio,
            output,
            delete_sources,
        } => run_merge(&video, &audio, &output, delete_sources),
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

fn run_devices(config: Option<&Path>) -> Result<()> {
    let mut config: RecorderConfig = config::load(config)?;
    config::apply_env(&mut config.tools);

    let cameras = list_video_sources(&config.tools);
    let microphones = list_audio_sources();

    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in &cameras {
        println!("video {}: {}x{}", camera.index, camera.width, camera.height);
    }
    if microphones.is_empty() {
        println!("No microphones found");
    }
    for microphone in &microphones {
        println!(
            "audio {}: {} ({})",
            microphone.index, microphone.name, microphone.id
        );
    }
    Ok(())
}

fn run_play(path: &Path, seconds: Option<f64>, config: Option<&Path>) -> Result<()> {
    let mut config: PlayerConfig = config::load(config)?;
    config::apply_env(&mut config.tools);

    let (event_tx, event_rx) = event_channel();
    let logger = spawn_event_logger(event_rx)?;

    let display = Arc::new(LoggingDisplay::default());
    let control = Arc::new(LoggingControl::default());
    let player = VideoPlayer::open(
        path,
        display.clone(),
        &config,
        Attachments {
            control: Some(control.clone()),
            events: Some(event_tx),
            audio: None,
        },
    )
    .with_context(|| format!("failed to open {}", path.display()))?;

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f64(s));
    let (command_tx, command_rx) = player_command_channel();

    thread::scope(|scope| -> Result<()> {
        scope.spawn(|| serve_player(&player, &command_rx));

        command_tx.send(PlayerCommand::Play)?;
        while !control.has_finished() && deadline.map_or(true, |d| Instant::now() < d) {
            thread::sleep(POLL_INTERVAL);
        }
        command_tx.send(PlayerCommand::Shutdown)?;
        Ok(())
    })?;

    let rendered = display.rendered();
    info!(
        rendered,
        loaded = player.frame_count_loaded(),
        position = player.position(),
        "Playback finished"
    );

    drop(player);
    if logger.join().is_err() {
        warn!("Event logger panicked");
    }
    Ok(())
}

fn run_record(
    video_index: u32,
    audio_index: Option<u32>,
    output: &Path,
    seconds: f64,
    config: Option<&Path>,
) -> Result<()> {
    let mut config: RecorderConfig = config::load(config)?;
    config::apply_env(&mut config.tools);

    let video_source = first_available(
        list_video_sources(&config.tools)
            .into_iter()
            .filter(|source| source.index == video_index),
    )
    .with_context(|| format!("camera {video_index}"))?;
    let audio_source = match audio_index {
        Some(index) => Some(
            first_available(
                list_audio_sources()
                    .into_iter()
                    .filter(|source| source.index == index),
            )
            .with_context(|| format!("microphone {index}"))?,
        ),
        None => None,
    };

    let (event_tx, event_rx) = event_channel();
    let logger = spawn_event_logger(event_rx)?;

    let display = Arc::new(LoggingDisplay::default());
    let recorder = VideoRecorder::new(
        video_source,
        audio_source,
        display.clone(),
        config,
        Some(event_tx),
    )?;

    recorder.start_capture()?;
    recorder.start_recording(None)?;
    info!(seconds, "Recording");
    thread::sleep(Duration::from_secs_f64(seconds));

    let result = if recorder.audio_source().is_some() {
        if recorder.merge_sources(output, true) {
            Ok(())
        } else {
            Err(anyhow!("failed to merge recordings into {}", output.display()))
        }
    } else {
        recorder
            .stop_capture()
            .map_err(anyhow::Error::from)
            .and_then(|()| {
                fs::rename(recorder.video_path(), output)
                    .with_context(|| format!("failed to move recording to {}", output.display()))
            })
    };

    let previewed = display.rendered();
    info!(
        frames = recorder.frames_recorded(),
        previewed,
        "Recording finished"
    );

    drop(recorder);
    if logger.join().is_err() {
        warn!("Event logger panicked");
    }
    result
}

fn run_merge(video: &Path, audio: &Path, output: &Path, delete_sources: bool) -> Result<()> {
    let mut tools = ToolConfig::default();
    config::apply_env(&mut tools);

    if !Transcoder::from_tools(&tools).merge(video, audio, output, delete_sources) {
        bail!("failed to merge into {}", output.display());
    }
    println!("{}", output.display());
    Ok(())
}
