//! Subplayer Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::player::PlayerError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// True when the player binary could not be found or executed
    pub fn is_player_missing(&self) -> bool {
        matches!(self, CoreError::Player(PlayerError::ProcessNotFound { .. }))
    }
}
