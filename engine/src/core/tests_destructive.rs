//! Destructive and Edge Case Tests for Core Models
//!
//! These tests verify the robustness of the engine against hostile player
//! output and out-of-range inputs.

use crate::core::player::{extract_payload, PositionSample, SlaveCommand};
use crate::core::settings::PlayerSettings;
use crate::core::{
    normalize_position, time_to_frames, VideoSize, DEFAULT_ASPECT_RATIO, END_OF_STREAM,
};

#[test]
fn test_destructive_payload_parsing() {
    // Value containing '=' loses everything before its last '='
    assert_eq!(extract_payload("ANS_path=/media/a=b.avi"), "b.avi");
    // Multi-byte text around the separator
    assert_eq!(extract_payload("ANS_título=ñ"), "ñ");
    assert_eq!(extract_payload(""), "");
    assert_eq!(extract_payload("===="), "");
}

#[test]
fn test_destructive_position_values() {
    let huge = PositionSample::from_query(Ok(f64::MAX));
    assert_eq!(huge, PositionSample::At(f64::MAX));

    // Only exactly -1 is the sentinel.
    assert_eq!(PositionSample::from_query(Ok(-1.0)), PositionSample::End);
    assert_eq!(
        PositionSample::from_query(Ok(-1.0000001)),
        PositionSample::At(0.0)
    );
    assert_eq!(normalize_position(f64::NEG_INFINITY), 0.0);
    assert_eq!(normalize_position(END_OF_STREAM), END_OF_STREAM);
}

#[test]
fn test_destructive_seek_targets() {
    assert_eq!(
        SlaveCommand::SeekAbsolute(f64::NAN).to_line(),
        "pausing_keep seek 0 2"
    );
    assert_eq!(
        SlaveCommand::SeekRelative(-0.0001).to_line(),
        "pausing_keep seek 0 0"
    );
    assert_eq!(
        SlaveCommand::SeekAbsolute(3599.9999).to_line(),
        "pausing_keep seek 3600 2"
    );
}

#[test]
fn test_destructive_video_dimensions() {
    assert_eq!(VideoSize::new(-640, 480).aspect_ratio(), DEFAULT_ASPECT_RATIO);
    assert_eq!(VideoSize::new(640, -480).aspect_ratio(), DEFAULT_ASPECT_RATIO);
    assert_eq!(time_to_frames(f64::INFINITY, 25.0), 0);
}

#[test]
fn test_destructive_settings_json() {
    // Wrong types for a field are a parse error, not a panic.
    assert!(serde_json::from_str::<PlayerSettings>(r#"{ "pollIntervalMs": "fast" }"#).is_err());

    // Unknown fields are ignored.
    let settings: PlayerSettings =
        serde_json::from_str(r#"{ "theme": "dark", "seekStepSec": -5 }"#).unwrap();
    assert_eq!(settings.normalized().seek_step_sec, 0.04);
}
