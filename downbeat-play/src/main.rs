//! downbeat-play - Command-line player on the downbeat audio core
//!
//! Plays one music file, optionally hammering a sound effect into the mix
//! on an interval, and reports the playback position once per second.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use downbeat_audio::{load_effect, AudioContext, AudioOutput, ContextConfig};
use tokio::signal;
use tokio::time;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::PlayerConfig;

/// Command-line arguments for downbeat-play
#[derive(Parser, Debug)]
#[command(name = "downbeat-play")]
#[command(about = "Play a music file through the downbeat audio core")]
#[command(version)]
struct Args {
    /// Music file to play
    #[arg(required_unless_present = "list_devices")]
    music: Option<PathBuf>,

    /// Sound effect file to offer into the mix on an interval
    #[arg(long)]
    effect: Option<PathBuf>,

    /// Interval between effect offers, in milliseconds
    #[arg(long)]
    effect_interval_ms: Option<u64>,

    /// Output device name (system default when omitted)
    #[arg(long, env = "DOWNBEAT_DEVICE")]
    device: Option<String>,

    /// Requested device buffer size in frames
    #[arg(long)]
    buffer_frames: Option<u32>,

    /// Output volume in [0.0, 1.0]
    #[arg(long)]
    volume: Option<f32>,

    /// TOML config file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "downbeat_play=info,downbeat_audio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        for name in AudioOutput::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    tokio::select! {
        result = run(args) => result,
        _ = shutdown_signal() => Ok(()),
    }
}

async fn run(args: Args) -> Result<()> {
    let music = args.music.context("no music file given")?;

    let file = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    let mut context_config = ContextConfig {
        device: args.device.or(file.device),
        ..ContextConfig::default()
    };
    if let Some(frames) = args.buffer_frames.or(file.buffer_frames) {
        context_config.buffer_frames = frames;
    }
    if let Some(volume) = args.volume.or(file.volume) {
        context_config.volume = volume;
    }
    let effect_path = args.effect.or(file.effect);
    let effect_interval = Duration::from_millis(
        args.effect_interval_ms
            .or(file.effect_interval_ms)
            .unwrap_or(1000),
    );

    let mut audio = AudioContext::open_with(&music, &context_config)
        .with_context(|| format!("failed to open {}", music.display()))?;

    // Effect frames are decoded against whatever the device granted
    let effect = match effect_path {
        Some(path) => {
            let frame = load_effect(&path, &audio.device_spec())
                .with_context(|| format!("failed to load effect {}", path.display()))?;
            info!("loaded effect {} ({} frames)", path.display(), frame.frames());
            Some(frame)
        }
        None => None,
    };

    audio.play().context("failed to start playback")?;
    info!("playing {}", music.display());

    let mut position_tick = time::interval(Duration::from_secs(1));
    let mut effect_tick = time::interval(effect_interval);

    loop {
        tokio::select! {
            _ = position_tick.tick() => {
                if audio.has_error() {
                    audio.close();
                    bail!("playback failed, see log for details");
                }
                if audio.is_finished() {
                    info!("finished at {:.2}s", audio.position());
                    break;
                }
                info!("position: {:.2}s", audio.position());
            }
            _ = effect_tick.tick(), if effect.is_some() => {
                if let Some(frame) = &effect {
                    if !audio.offer_effect(Arc::clone(frame)) {
                        debug!("effect slot still occupied, offer skipped");
                    }
                }
            }
        }
    }

    audio.close();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
