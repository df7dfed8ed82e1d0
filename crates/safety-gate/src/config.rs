//! Engine configuration

use alerting::AlertConfig;
use attention_game::ChallengeConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use vehicle_stop::StopConfig;

/// Complete drowsiness engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-frame detection thresholds
    pub dms: DmsConfig,

    /// Alert playback caps
    pub alert: AlertConfig,

    /// Vehicle stop confirmation
    pub stop: StopConfig,

    /// Attention challenge parameters
    pub challenge: ChallengeConfig,

    /// Drowsy events tolerated before a stop is requested
    pub drowsy_event_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dms: DmsConfig::default(),
            alert: AlertConfig::default(),
            stop: StopConfig::default(),
            challenge: ChallengeConfig::default(),
            drowsy_event_threshold: 5,
        }
    }
}

impl EngineConfig {
    /// Create strict config (earlier detection, fewer tolerated events)
    pub fn strict() -> Self {
        Self {
            dms: DmsConfig::strict(),
            challenge: ChallengeConfig::strict(),
            drowsy_event_threshold: 3,
            ..Default::default()
        }
    }

    /// Create lenient config (later detection, more tolerated events)
    pub fn lenient() -> Self {
        Self {
            dms: DmsConfig::lenient(),
            challenge: ChallengeConfig::lenient(),
            drowsy_event_threshold: 8,
            ..Default::default()
        }
    }
}
