//! DMS configuration

use serde::{Deserialize, Serialize};

/// DMS configuration
///
/// Every field is live-tunable through [`crate::DmsModule::update_config`].
/// Values are trusted; no range validation is performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye aspect ratio below which an eye counts as closed
    pub ear_threshold: f32,

    /// Drive the closed decision from the eye classifier when a reading is available
    pub eye_classifier_enabled: bool,

    /// Smoothed closed-probability at or above which eyes count as closed
    pub eye_classifier_threshold: f32,

    /// Trailing window of classifier predictions averaged per eye
    pub eye_smoothing_window: usize,

    /// Continuous closure before the driver is considered drowsy (milliseconds)
    pub drowsiness_threshold_ms: u64,

    /// Continuous closure before the overlay appears (milliseconds)
    pub overlay_show_delay_ms: u64,

    /// Grace period after reopening during which a visible overlay stays up (milliseconds)
    pub overlay_hide_delay_ms: u64,

    /// Time for the overlay fade to go from 0 to 1 (milliseconds)
    pub overlay_fade_in_ms: u64,

    /// Time for the overlay fade to go from 1 to 0 (milliseconds)
    pub overlay_fade_out_ms: u64,

    /// Head tilt threshold (degrees from horizontal)
    pub tilt_threshold_degrees: f32,

    /// Tilt must be held this long with eyes closed before the gesture fires (milliseconds)
    pub tilt_hold_ms: u64,

    /// Minimum gap between two gesture animations (milliseconds)
    pub tilt_cooldown_ms: u64,

    /// Length of one gesture animation (milliseconds)
    pub gesture_animation_ms: u64,

    /// Gate yawns on the mouth classifier when a reading is available
    pub mouth_classifier_enabled: bool,

    /// Smoothed yawn probability required by the classifier gate
    pub yawn_probability_threshold: f32,

    /// Mouth-open ratio that triggers a yawn when no classifier is used
    pub yawn_ratio_threshold: f32,

    /// Minimum mouth-open ratio required alongside the classifier
    pub yawn_min_mouth_ratio: f32,

    /// Gate must hold this long before the yawn cue fires (milliseconds)
    pub yawn_min_hold_ms: u64,

    /// Minimum gap between two yawn cues (milliseconds)
    pub yawn_cooldown_ms: u64,

    /// Length of one yawn cue animation (milliseconds)
    pub yawn_cue_ms: u64,

    /// Trailing window of mouth classifier predictions averaged together
    pub mouth_smoothing_window: usize,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            eye_classifier_enabled: false,
            eye_classifier_threshold: 0.6,
            eye_smoothing_window: 5,
            drowsiness_threshold_ms: 1500,
            overlay_show_delay_ms: 1200,
            overlay_hide_delay_ms: 800,
            overlay_fade_in_ms: 180,
            overlay_fade_out_ms: 650,
            tilt_threshold_degrees: 12.0,
            tilt_hold_ms: 1500,
            tilt_cooldown_ms: 2500,
            gesture_animation_ms: 1500,
            mouth_classifier_enabled: false,
            yawn_probability_threshold: 0.6,
            yawn_ratio_threshold: 0.6,
            yawn_min_mouth_ratio: 0.35,
            yawn_min_hold_ms: 500,
            yawn_cooldown_ms: 3000,
            yawn_cue_ms: 1200,
            mouth_smoothing_window: 6,
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            drowsiness_threshold_ms: 1000,
            overlay_show_delay_ms: 900,
            tilt_hold_ms: 1000,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            drowsiness_threshold_ms: 2500,
            overlay_show_delay_ms: 1800,
            overlay_hide_delay_ms: 500,
            tilt_hold_ms: 2000,
            ..Default::default()
        }
    }

    /// Tilt threshold converted to radians
    pub fn tilt_threshold_rad(&self) -> f32 {
        self.tilt_threshold_degrees.to_radians()
    }
}
