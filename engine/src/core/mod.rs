//! Subplayer Core Engine
//!
//! Controls an external slave-mode media player and keeps a logical
//! playback position in sync with it.

pub mod player;
pub mod process;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_destructive;
