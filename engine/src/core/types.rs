//! Subplayer Core Type Definitions
//!
//! Defines fundamental time, frame and playback-state types used by the engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Time in frames (integer)
pub type Frame = i64;

/// Reserved position value meaning "the stream has ended".
///
/// Never a valid position and never published as a position notification.
pub const END_OF_STREAM: TimeSec = -1.0;

/// Aspect ratio used when the player cannot report usable dimensions.
pub const DEFAULT_ASPECT_RATIO: f64 = 1.67;

/// Returns true if `position` is the end-of-stream sentinel.
pub fn is_end_of_stream(position: TimeSec) -> bool {
    position == END_OF_STREAM
}

/// Normalizes a raw position reported by the player.
///
/// The sentinel passes through untouched; any other negative or non-finite
/// value is clamped to zero.
pub fn normalize_position(position: TimeSec) -> TimeSec {
    if is_end_of_stream(position) {
        return position;
    }
    if !position.is_finite() || position < 0.0 {
        return 0.0;
    }
    position
}

/// Converts a time to a frame index at the given frame rate.
pub fn time_to_frames(time: TimeSec, fps: f64) -> Frame {
    if !fps.is_finite() || fps <= 0.0 || !time.is_finite() {
        return 0;
    }
    (time * fps).round() as Frame
}

/// Converts a frame index to a time at the given frame rate.
pub fn frames_to_time(frames: Frame, fps: f64) -> TimeSec {
    if !fps.is_finite() || fps <= 0.0 {
        return 0.0;
    }
    frames as f64 / fps
}

// =============================================================================
// Playback Types
// =============================================================================

/// Logical playback state tracked by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    /// No media open
    #[default]
    Stopped,
    /// Media open and advancing
    Playing,
    /// Media open, position frozen
    Paused,
}

/// Properties of an opened stream, captured at open time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Stream duration in seconds
    pub length: TimeSec,
    /// Width / height of the video
    pub aspect_ratio: f64,
    /// Frames per second, when the player reports one
    pub frame_rate: Option<f64>,
}

/// Video dimensions as reported by the player
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: i64,
    pub height: i64,
}

impl VideoSize {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    ///
    /// Falls back to [`DEFAULT_ASPECT_RATIO`] when either side is not positive.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width <= 0 || self.height <= 0 {
            warn!(
                "Indeterminate video size {}x{}, using default aspect ratio",
                self.width, self.height
            );
            return DEFAULT_ASPECT_RATIO;
        }
        self.width as f64 / self.height as f64
    }
}
