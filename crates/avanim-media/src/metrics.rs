//! Metrics for animation generation.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const ANIMATIONS_TOTAL: &str = "avanim_animations_total";
    pub const ANIMATION_DURATION_SECONDS: &str = "avanim_animation_duration_seconds";
    pub const FRAMES_RENDERED_TOTAL: &str = "avanim_frames_rendered_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "avanim_ffmpeg_duration_seconds";
}

/// Record a finished generation attempt.
pub fn record_animation(outcome: &str, device: &str, duration_secs: f64) {
    let labels = [
        ("outcome", outcome.to_string()),
        ("device", device.to_string()),
    ];
    counter!(names::ANIMATIONS_TOTAL, &labels).increment(1);
    histogram!(names::ANIMATION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record frames produced by the generator.
pub fn record_frames_rendered(device: &str, frames: u64) {
    let labels = [("device", device.to_string())];
    counter!(names::FRAMES_RENDERED_TOTAL, &labels).increment(frames);
}

/// Record FFmpeg processing duration.
pub fn record_ffmpeg_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}
