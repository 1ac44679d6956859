//! Subplayer CLI
//!
//! Drives a slave-mode media player from the terminal. Player notifications
//! are printed to stdout as JSON lines; logs go to stderr.

mod interactive;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use interactive::{Interactive, HELP};
use subplayer_lib::core::player::{detect_player_info, ChannelListener, NullListener, PlaybackEngine};
use subplayer_lib::core::settings::{PlayerSettings, SettingsManager};
use subplayer_lib::core::{CoreError, StreamInfo};

#[derive(Debug, Parser)]
#[command(name = "subplayer-cli", version, about = "Control MPlayer in slave mode")]
struct Cli {
    /// Directory holding settings.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Player executable, overriding the configured one
    #[arg(long, global = true)]
    binary: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a file, start playback and read commands from stdin
    Play {
        media: PathBuf,
        /// Window id to render into
        #[arg(long)]
        wid: Option<u64>,
    },
    /// Print stream properties as JSON
    Info { media: PathBuf },
    /// Print the effective settings, or reset them
    Config {
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigReport<'a> {
    settings_path: String,
    settings: &'a PlayerSettings,
    detected_player: Option<String>,
    player_version: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    subplayer_lib::init_logging(cli.log_dir.as_deref());

    let manager = match &cli.config_dir {
        Some(dir) => SettingsManager::new(dir),
        None => SettingsManager::with_default_dir()?,
    };
    let mut settings = manager.load();
    if let Some(binary) = &cli.binary {
        settings.binary_path = Some(binary.clone());
    }

    match cli.command {
        Command::Play { media, wid } => run_play(&settings, media, wid).await,
        Command::Info { media } => run_info(&settings, media).await,
        Command::Config { reset } => run_config(&manager, settings, reset),
    }
}

async fn open_media(engine: &PlaybackEngine, media: &Path) -> Result<StreamInfo> {
    match engine.open(media).await.map_err(CoreError::from) {
        Ok(info) => Ok(info),
        Err(e) if e.is_player_missing() => {
            eprintln!("Install MPlayer, or point --binary at the player executable.");
            Err(e.into())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open {}", media.display())),
    }
}

async fn run_info(settings: &PlayerSettings, media: PathBuf) -> Result<()> {
    let engine = PlaybackEngine::with_settings(settings, Arc::new(NullListener), None);
    let info = open_media(&engine, &media).await?;
    engine.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_config(manager: &SettingsManager, settings: PlayerSettings, reset: bool) -> Result<()> {
    let settings = if reset {
        manager.reset().context("Failed to reset settings")?
    } else {
        settings
    };

    let detected = detect_player_info(settings.binary_path.as_deref(), &settings.binary_name);
    let (detected_player, player_version) = match detected {
        Ok(info) => (Some(info.path.display().to_string()), info.version),
        Err(e) => {
            tracing::warn!("{}", e);
            (None, None)
        }
    };

    let report = ConfigReport {
        settings_path: manager.settings_path().display().to_string(),
        settings: &settings,
        detected_player,
        player_version,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_play(settings: &PlayerSettings, media: PathBuf, wid: Option<u64>) -> Result<()> {
    let (listener, mut events) = ChannelListener::new();
    let engine = PlaybackEngine::with_settings(settings, Arc::new(listener), wid);

    let info = open_media(&engine, &media).await?;
    eprintln!(
        "Opened {} ({:.2}s, aspect {:.3}). {}",
        media.display(),
        info.length,
        info.aspect_ratio,
        HELP
    );
    engine.play().await?;

    let step = settings.normalized().seek_step();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!("{}", serde_json::to_string(&event)?);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let command = match Interactive::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                match command {
                    Interactive::Play => engine.play().await?,
                    Interactive::Pause => engine.pause().await?,
                    Interactive::Seek(target) => engine.seek(target).await?,
                    Interactive::Rewind(amount) => engine.rewind(amount.unwrap_or(step)).await?,
                    Interactive::Forward(amount) => engine.forward(amount.unwrap_or(step)).await?,
                    Interactive::Frame(frame) => {
                        if engine.frame_rate().await?.is_none() {
                            eprintln!("Frame rate unknown; frame seeks are unavailable");
                        }
                        engine.seek_frames(frame).await?;
                    }
                    Interactive::Position => {
                        let position = engine.position().await?;
                        let frames = engine.position_frames().await?;
                        println!("{}", serde_json::json!({ "position": position, "frame": frames }));
                    }
                    Interactive::Info => {
                        let state = engine.state().await?;
                        println!(
                            "{}",
                            serde_json::json!({ "state": state, "stream": engine.stream_info().await? })
                        );
                    }
                    Interactive::Help => eprintln!("{}", HELP),
                    Interactive::Quit => break,
                }
            }
        }
    }

    engine.shutdown().await;
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
