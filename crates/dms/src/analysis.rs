//! DMS per-frame input and analysis results

use serde::{Deserialize, Serialize};

use crate::closure::DrowsyTransition;
use crate::eye::{EyeDecision, EyeReading};
use crate::gesture::GestureTrigger;
use crate::landmarks::FaceLandmarks;
use crate::overlay::OverlayUpdate;
use crate::state::ClosurePhase;
use crate::yawn::{MouthLabel, MouthReading, YawnCue};

/// Signals supplied by the tracker and classifiers for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Monotonic capture time
    pub timestamp_ms: u64,

    /// Every tracked face; may be empty
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,

    /// Fresh eye classifier output for the target face, if any
    #[serde(default)]
    pub eye_reading: Option<EyeReading>,

    /// Fresh mouth classifier output for the target face, if any
    #[serde(default)]
    pub mouth_reading: Option<MouthReading>,
}

impl FrameInput {
    pub fn new(timestamp_ms: u64, faces: Vec<FaceLandmarks>) -> Self {
        Self {
            timestamp_ms,
            faces,
            ..Default::default()
        }
    }

    pub fn with_eye_reading(mut self, reading: EyeReading) -> Self {
        self.eye_reading = Some(reading);
        self
    }

    pub fn with_mouth_reading(mut self, reading: MouthReading) -> Self {
        self.mouth_reading = Some(reading);
        self
    }
}

/// Derived measurements of the target face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSignal {
    pub timestamp_ms: u64,
    pub eye: EyeDecision,
    /// Cheek-line angle (radians)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt_rad: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yawn_probability: Option<f32>,
    pub mouth_label: MouthLabel,
}

/// Discrete events raised while analyzing a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DmsEvent {
    /// Closure reached the drowsiness threshold
    DrowsinessStarted,
    /// Drowsy state ended (eyes opened or tracking lost)
    DrowsinessCleared,
    OverlayShown,
    OverlayHidden,
    TiltGesture(GestureTrigger),
    Yawn(YawnCue),
}

impl From<DrowsyTransition> for DmsEvent {
    fn from(transition: DrowsyTransition) -> Self {
        match transition {
            DrowsyTransition::Entered => DmsEvent::DrowsinessStarted,
            DrowsyTransition::Exited => DmsEvent::DrowsinessCleared,
        }
    }
}

/// Complete DMS analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Whether any face was tracked this frame
    pub face_detected: bool,

    /// Number of faces supplied
    pub face_count: usize,

    /// Index of the monitored face
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_face: Option<usize>,

    /// Measurements of the monitored face (absent when its landmarks were unusable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<FrameSignal>,

    /// Length of the current unbroken closure
    pub closed_for_ms: u64,

    pub phase: ClosurePhase,

    pub overlay: OverlayUpdate,

    pub events: Vec<DmsEvent>,
}

impl DmsAnalysis {
    pub fn eyes_closed(&self) -> bool {
        self.signal.is_some_and(|s| s.eye.closed)
    }

    pub fn is_drowsy(&self) -> bool {
        self.phase == ClosurePhase::Drowsy
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// True when the overlay went from hidden to visible this frame
    pub fn overlay_became_visible(&self) -> bool {
        self.events.contains(&DmsEvent::OverlayShown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_input_from_json() {
        let json = r#"{
            "timestamp_ms": 1200,
            "faces": [ { "13": { "x": 0.5, "y": 0.6 } } ],
            "eye_reading": { "left": 0.8 },
            "mouth_reading": [0.1, 0.2, 0.3, 0.4]
        }"#;
        let frame: FrameInput = serde_json::from_str(json).unwrap();
        assert_eq!(frame.timestamp_ms, 1200);
        assert_eq!(frame.faces.len(), 1);
        assert_eq!(frame.eye_reading.unwrap().right, None);
        assert!(matches!(frame.mouth_reading, Some(MouthReading::Vector(_))));
    }

    #[test]
    fn test_overlay_edge_helper() {
        let analysis = DmsAnalysis {
            events: vec![DmsEvent::DrowsinessStarted, DmsEvent::OverlayShown],
            ..Default::default()
        };
        assert!(analysis.overlay_became_visible());
        assert!(analysis.has_events());
        assert!(!DmsAnalysis::default().overlay_became_visible());
    }
}
