//! Side effects requested by the engine

use alerting::AlertCommand;
use attention_game::{ChallengeOutcome, ChallengeUi};
use dms::{GestureTrigger, YawnCue};
use serde::{Deserialize, Serialize};
use vehicle_stop::GeoFix;

pub const DROWSY_MESSAGE: &str = "Drowsiness detected!";

/// Data for a best-effort incident notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub reason: String,
    pub drowsy_events: u32,
    /// Most recent position seen by the engine
    pub position: Option<GeoFix>,
}

/// Everything the host must do after an engine call, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EngineEffect {
    /// Start or stop the alert sound
    Alert { command: AlertCommand },
    /// Driver-facing status line ("" clears it)
    StatusMessage { text: String },
    /// Overlay visibility and opacity for this frame
    Overlay { showing: bool, fade: f32 },
    /// Play the head-tilt gesture animation
    Gesture { trigger: GestureTrigger },
    /// Play the yawn cue
    YawnCue { cue: YawnCue },
    /// Drowsy-event counter changed
    DrowsyCount { count: u32 },
    /// Show the park banner or update its text
    ParkBanner { status: String },
    HideParkBanner,
    /// Subscribe to position updates
    StartGeoWatch,
    /// Drop the position subscription
    StopGeoWatch,
    /// Challenge screen state
    Challenge { ui: ChallengeUi },
    /// The challenge ended with a result
    ChallengeFinished { outcome: ChallengeOutcome },
    /// Send an incident notification (fire-and-forget)
    NotifyIncident { report: IncidentReport },
}
