//! Subplayer Core Library
//!
//! Drives an MPlayer process in slave mode for a subtitle editor: opening
//! media, play/pause/seek control, and a stream of position notifications
//! that follows the real player.
//!
//! ```no_run
//! # async fn demo() -> Result<(), subplayer_lib::core::CoreError> {
//! use std::sync::Arc;
//! use subplayer_lib::core::player::{ChannelListener, PlaybackEngine};
//! use subplayer_lib::core::settings::PlayerSettings;
//!
//! let (listener, mut events) = ChannelListener::new();
//! let engine = PlaybackEngine::with_settings(&PlayerSettings::default(), Arc::new(listener), None);
//! engine.open("episode01.avi").await?;
//! engine.play().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;

/// Log file name prefix inside the log directory
pub const LOG_FILE_NAME: &str = "subplayer.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Logs go to stderr, and additionally to a daily-rolling file when
/// `log_dir` is given. The filter comes from `RUST_LOG`, defaulting to
/// `info`. Calling this more than once is harmless.
pub fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Cannot create log directory {}: {}", dir.display(), e);
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        if LOG_GUARD.set(guard).is_err() {
            // Already initialized; the first writer stays in charge.
            return None;
        }
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, repeated CLI setup).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
