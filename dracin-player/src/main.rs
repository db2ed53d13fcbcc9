//! Dracin Player (dracin-player) - headless harness
//!
//! Opens a watch session for one episode and drives it from the terminal:
//! the media timeline is simulated in real time, shortcut keys and commands
//! are read from stdin one per line, and player events are logged. Progress
//! is flushed on exit (EOF, `quit`, or Ctrl+C).
//!
//! Lines are either shortcut keys (`k`, `j`, `l`, `,`, `.`, `m`, `f`, `p`,
//! `<`, `>`, `?`, `space`, `left`, `right`, `up`, `down`) or commands:
//! `seek <secs>`, `volume <0-1>`, `rate <r>`, `ep <id>`, `next`, `cancel`,
//! `sidebar`, `tap <x> <width>`, `end`, `stall`, `resume`, `fail`, `status`,
//! `quit`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dracin_common::events::PlayerEvent;
use dracin_common::time::format_timestamp;
use dracin_player::api::memory::{demo_series, InMemoryBackend};
use dracin_player::api::{BackendClient, CatalogApi, ProgressApi};
use dracin_player::config::{ConfigOverrides, TomlConfig};
use dracin_player::logging;
use dracin_player::playback::input::Focus;
use dracin_player::{PlayerCommand, PlayerHandle, PlayerRuntime, SimulatedMedia};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Media timeline step
const STEP_INTERVAL: Duration = Duration::from_millis(250);

/// Command-line arguments for dracin-player
#[derive(Parser, Debug)]
#[command(name = "dracin-player")]
#[command(about = "Headless Dracin watch player")]
#[command(version)]
struct Args {
    /// Episode to open (defaults to the first demo episode with --offline)
    episode_id: Option<String>,

    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "DRACIN_API_URL")]
    base_url: Option<String>,

    /// Use the built-in demo catalog and in-memory progress store
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter_handle = logging::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(ConfigOverrides {
            base_url: args.base_url.clone(),
            log_level: None,
            config_path: args.config.clone(),
        });
    logging::apply_config(&filter_handle, &config.logging)
        .context("Failed to configure logging")?;

    info!("Starting Dracin player v{}", env!("CARGO_PKG_VERSION"));

    let catalog: Arc<dyn CatalogApi>;
    let progress: Arc<dyn ProgressApi>;
    if args.offline {
        info!("Offline mode: using demo catalog");
        let backend = Arc::new(InMemoryBackend::demo());
        catalog = backend.clone();
        progress = backend;
    } else {
        info!("Backend: {}", config.backend.base_url);
        let client = Arc::new(
            BackendClient::new(&config.backend).context("Failed to create backend client")?,
        );
        catalog = client.clone();
        progress = client;
    }

    let episode_id = match (&args.episode_id, args.offline) {
        (Some(id), _) => id.clone(),
        (None, true) => demo_series()
            .episodes
            .first()
            .map(|e| e.id.clone())
            .context("Demo catalog is empty")?,
        (None, false) => anyhow::bail!("An episode ID is required unless --offline is set"),
    };

    let media = SimulatedMedia::new();
    let runtime = PlayerRuntime::open(
        config.player.clone(),
        catalog,
        progress,
        Box::new(media.clone()),
        &episode_id,
    )
    .await
    .with_context(|| format!("Failed to open episode {}", episode_id))?;
    let handle = runtime.handle();

    let logger = tokio::spawn(log_events(handle.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(STEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => media.step(STEP_INTERVAL),
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !dispatch_line(line.trim(), &handle, &media) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    runtime
        .shutdown()
        .await
        .context("Player shutdown failed")?;
    logger.abort();

    info!("Player shutdown complete");
    Ok(())
}

/// Handle one stdin line; returns `false` to quit
fn dispatch_line(line: &str, handle: &PlayerHandle, media: &SimulatedMedia) -> bool {
    let mut parts = line.split_whitespace();
    let word = parts.next().unwrap_or("");
    let arg = parts.next();

    let result = match (word, arg) {
        ("", _) => Ok(()),
        ("quit" | "exit", _) => return false,
        ("status", _) => {
            print_status(handle);
            Ok(())
        }
        ("seek", Some(value)) => match value.parse::<f64>() {
            Ok(seconds) => handle.seek_to(seconds),
            Err(_) => {
                warn!("Not a number: {}", value);
                Ok(())
            }
        },
        ("volume", Some(value)) => match value.parse::<f64>() {
            Ok(volume) => handle.set_volume(volume),
            Err(_) => {
                warn!("Not a number: {}", value);
                Ok(())
            }
        },
        ("rate", Some(value)) => match value.parse::<f64>() {
            Ok(rate) => handle.set_playback_rate(rate),
            Err(_) => {
                warn!("Not a number: {}", value);
                Ok(())
            }
        },
        ("ep", Some(id)) => handle.select_episode(id),
        ("next", _) => handle.play_next(),
        ("cancel", _) => handle.cancel_auto_advance(),
        ("sidebar", _) => {
            let open = handle.state().is_sidebar_open;
            handle.command(PlayerCommand::SetSidebarOpen(!open))
        }
        ("tap", Some(x)) => {
            let width = parts.next().and_then(|w| w.parse().ok()).unwrap_or(900.0);
            match x.parse::<f64>() {
                Ok(x) => handle.tap(x, width),
                Err(_) => {
                    warn!("Not a number: {}", x);
                    Ok(())
                }
            }
        }
        ("end", _) => {
            media.finish();
            Ok(())
        }
        ("stall", _) => {
            media.set_buffering(true);
            Ok(())
        }
        ("resume", _) => {
            media.set_buffering(false);
            Ok(())
        }
        ("fail", _) => {
            media.fail("simulated decode error");
            Ok(())
        }
        (key, None) => handle.key(key_name(key), Focus::Player),
        (other, Some(_)) => {
            warn!("Unknown command: {}", other);
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Command failed: {}", e);
        return false;
    }
    true
}

/// Map terminal-friendly names to DOM key names
fn key_name(word: &str) -> &str {
    match word {
        "space" => " ",
        "left" => "ArrowLeft",
        "right" => "ArrowRight",
        "up" => "ArrowUp",
        "down" => "ArrowDown",
        other => other,
    }
}

fn print_status(handle: &PlayerHandle) {
    let state = handle.state();
    let episode = state
        .current_episode
        .as_ref()
        .map(|e| format!("Ep {} {}", e.episode_number, e.title))
        .unwrap_or_else(|| "-".to_string());
    info!(
        playing = state.is_playing,
        buffering = state.is_buffering,
        muted = state.is_muted,
        volume = state.volume,
        rate = state.playback_rate,
        unavailable = state.is_unavailable,
        "{} {} / {}",
        episode,
        format_timestamp(state.current_time),
        format_timestamp(state.duration)
    );
}

async fn log_events(handle: PlayerHandle) {
    let mut rx = handle.subscribe_events();
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Event logger lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::AutoAdvanceStarted {
            next_episode_title,
            seconds_remaining,
            ..
        } => info!("Up next: {} in {}s", next_episode_title, seconds_remaining),
        PlayerEvent::AutoAdvanceTick {
            seconds_remaining, ..
        } => info!("Up next in {}s", seconds_remaining),
        PlayerEvent::PlaybackFailed { message, .. } => {
            warn!("Episode unavailable: {}", message)
        }
        PlayerEvent::ShortcutHelpToggled { visible: true, .. } => {
            info!("Shortcuts: space/k play, j/l ±10s, ,/. ±5s, up/down volume, m mute, f fullscreen, p pip, </> speed")
        }
        other => info!("{}", other.name()),
    }
}
