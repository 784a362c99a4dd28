//! Command loops driving a player or recorder from a channel.

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, instrument};

use reel_ipc::{PlayerCommand, RecorderCommand};

use crate::player::VideoPlayer;
use crate::recorder::VideoRecorder;

/// Apply commands to `player` until `Shutdown` or until every sender is
/// dropped, then stop playback.
#[instrument(name = "serve_player", skip_all)]
pub fn serve_player(player: &VideoPlayer, commands: &Receiver<PlayerCommand>) {
    info!("Player command loop starting");

    loop {
        let command = match commands.recv() {
            Ok(command) => command,
            Err(_) => {
                info!("Command channel disconnected, shutting down");
                break;
            }
        };
        debug!(?command, "Handling command");

        match command {
            PlayerCommand::Play => {
                if let Err(e) = player.play() {
                    error!("Play failed: {}", e);
                }
            }
            PlayerCommand::Pause => player.pause(),
            PlayerCommand::Toggle => {
                if let Err(e) = player.toggle() {
                    error!("Toggle failed: {}", e);
                }
            }
            PlayerCommand::SkipForward => player.skip_video_forward(),
            PlayerCommand::SkipBackward => player.skip_video_backward(),
            PlayerCommand::LoadFrame(frame) => player.load_frame(frame),
            PlayerCommand::SetClip(clip) => player.set_clip(clip),
            PlayerCommand::CancelLoading => player.cancel_loading(),
            PlayerCommand::Shutdown => break,
        }
    }

    player.stop();
    info!("Player command loop stopped");
}

/// Apply commands to `recorder` until `Shutdown` or until every sender is
/// dropped, then stop capture and close the recordings.
#[instrument(name = "serve_recorder", skip_all)]
pub fn serve_recorder(recorder: &VideoRecorder, commands: &Receiver<RecorderCommand>) {
    info!("Recorder command loop starting");

    loop {
        let command = match commands.recv() {
            Ok(command) => command,
            Err(_) => {
                info!("Command channel disconnected, shutting down");
                break;
            }
        };
        debug!(?command, "Handling command");

        let result = match command {
            RecorderCommand::StartCapture => recorder.start_capture(),
            RecorderCommand::StartRecording { output } => recorder.start_recording(output),
            RecorderCommand::StopRecording => {
                recorder.stop_recording();
                Ok(())
            }
            RecorderCommand::StopCapture => recorder.stop_capture(),
            RecorderCommand::Merge {
                output,
                delete_sources,
            } => {
                recorder.merge_sources(&output, delete_sources);
                Ok(())
            }
            RecorderCommand::Shutdown => break,
        };

        if let Err(e) = result {
            error!("Recorder command failed: {}", e);
        }
    }

    if let Err(e) = recorder.stop_capture() {
        error!("Failed to close recordings: {}", e);
    }
    info!("Recorder command loop stopped");
}
