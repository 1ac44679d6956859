//! Slave-Mode Player Integration Module
//!
//! Drives an external MPlayer process over its standard streams:
//! - Process lifecycle (spawn, two-phase shutdown)
//! - Line-based request/response protocol
//! - Playback façade with logical play/pause state
//! - Periodic position polling with end-of-stream detection
//!
//! All protocol traffic for one engine runs on a single tokio task, so the
//! periodic poll and user commands can never interleave on the pipe.

mod channel;
mod detection;
mod engine;
mod events;
mod poller;
mod protocol;
mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use channel::{extract_payload, CommandChannel};
pub use detection::*;
pub use engine::{EngineOptions, PlaybackEngine};
pub use events::{ChannelListener, NullListener, PlayerEvent, PlayerListener};
pub use poller::{PollTrigger, PositionPoller, PositionSample};
pub use protocol::{SlaveCommand, FULLSCREEN_MARKER};
pub use session::{
    LaunchConfig, PlayerLauncher, PlayerTransport, ProcessSession, ShutdownOutcome, SlaveLauncher,
};

/// Player-related error types
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Media player not found: {binary}. Please install MPlayer or configure its path.")]
    ProcessNotFound { binary: String },

    #[error("Failed to start media player: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Player connection lost: {0}")]
    ProtocolRead(String),

    #[error("Player did not answer within {0:?}")]
    ReadTimeout(Duration),

    #[error("Unexpected response to '{command}': '{response}'")]
    InvalidResponse { command: String, response: String },

    #[error("Player did not become ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("A media file is already open")]
    AlreadyOpen,

    #[error("Playback engine has shut down")]
    EngineShutDown,
}

impl PlayerError {
    /// True for failures of the pipe itself (process gone or hung), as
    /// opposed to a well-formed but unusable answer.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            PlayerError::ProtocolRead(_) | PlayerError::ReadTimeout(_) | PlayerError::EngineShutDown
        )
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
