//! Command-line shell for reel.
//!
//! Plays a video file through the buffered player, records from a camera
//! and microphone, and merges recordings, logging frames and engine events
//! instead of drawing them.

mod cli;
mod config;
mod shell;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "reel=info,reel_engine=debug,reel_capture=debug,reel_audio=debug,reel_encoder=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = cli::run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
