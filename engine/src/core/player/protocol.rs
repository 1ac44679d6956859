//! Slave Protocol Vocabulary
//!
//! Every line the engine ever writes to the player is built here.

use std::fmt;

use crate::core::TimeSec;

/// Prefix of the answer to `get_vo_fullscreen`, used to find the end of
/// startup noise.
pub const FULLSCREEN_MARKER: &str = "ANS_VO_FULLSCREEN";

/// A single outbound slave-mode command.
///
/// The `paused` flag on time queries selects the `pausing` verb, which keeps
/// an already paused player paused; a plain query would resume it.
#[derive(Clone, Debug, PartialEq)]
pub enum SlaveCommand {
    /// Toggle between playing and paused
    TogglePause,
    /// Absolute seek to the start of the stream, leaving the player paused
    SeekStart,
    /// Absolute seek, pause state preserved
    SeekAbsolute(TimeSec),
    /// Relative seek (negative rewinds), pause state preserved
    SeekRelative(TimeSec),
    /// Ask the player to exit
    Quit,
    /// Current position in seconds
    TimePosition { paused: bool },
    /// Stream duration in seconds
    TimeLength { paused: bool },
    /// Video width in pixels
    VideoWidth,
    /// Video height in pixels
    VideoHeight,
    /// Video frame rate
    FrameRate,
    /// Cheap query whose answer marks the end of buffered output
    VoFullscreen,
}

impl SlaveCommand {
    /// Renders the command as the exact line sent to the player (no newline).
    pub fn to_line(&self) -> String {
        match self {
            SlaveCommand::TogglePause => "pause".to_string(),
            SlaveCommand::SeekStart => "pausing seek 0 2".to_string(),
            SlaveCommand::SeekAbsolute(secs) => {
                format!("pausing_keep seek {} 2", format_seconds(*secs))
            }
            SlaveCommand::SeekRelative(delta) => {
                format!("pausing_keep seek {} 0", format_seconds(*delta))
            }
            SlaveCommand::Quit => "quit".to_string(),
            SlaveCommand::TimePosition { paused: true } => "pausing get_time_pos".to_string(),
            SlaveCommand::TimePosition { paused: false } => "get_time_pos".to_string(),
            SlaveCommand::TimeLength { paused: true } => "pausing get_time_length".to_string(),
            SlaveCommand::TimeLength { paused: false } => "get_time_length".to_string(),
            SlaveCommand::VideoWidth => "pausing_keep get_property width".to_string(),
            SlaveCommand::VideoHeight => "pausing_keep get_property height".to_string(),
            SlaveCommand::FrameRate => "pausing_keep get_property fps".to_string(),
            SlaveCommand::VoFullscreen => "get_vo_fullscreen".to_string(),
        }
    }
}

impl fmt::Display for SlaveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Formats seconds with millisecond precision and no trailing zeros.
fn format_seconds(secs: TimeSec) -> String {
    let secs = if secs.is_finite() { secs } else { 0.0 };
    let text = format!("{:.3}", secs);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
