//! Driver Monitoring System (DMS)
//!
//! Per-frame driver state analysis from face landmarks:
//! - Target face selection
//! - Eye closure (geometry or classifier)
//! - Drowsiness state machine and overlay visibility
//! - Head-tilt gesture detection
//! - Yawn detection

pub mod analysis;
pub mod closure;
pub mod config;
pub mod eye;
pub mod gesture;
pub mod landmarks;
pub mod overlay;
pub mod smoothing;
pub mod state;
pub mod yawn;

pub use analysis::{DmsAnalysis, DmsEvent, FrameInput, FrameSignal};
pub use closure::{ClosureTimer, DrowsinessMachine, DrowsyTransition};
pub use config::DmsConfig;
pub use eye::{EyeDecision, EyePathway, EyeReading, EyeStateEstimator};
pub use gesture::{GestureDetector, GestureTrigger, TiltSide};
pub use landmarks::{FaceLandmarks, Point};
pub use overlay::{OverlayUpdate, OverlayVisibility};
pub use state::{ClosurePhase, EyeClosureState, OverlayState};
pub use yawn::{MouthLabel, MouthReading, YawnCue, YawnDetector};

use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DmsError {
    #[error("Landmark {0} missing from face")]
    LandmarkMissing(u16),
}

/// Driver monitoring module
pub struct DmsModule {
    config: DmsConfig,
    selected_face: Option<usize>,
    eye: EyeStateEstimator,
    timer: ClosureTimer,
    drowsiness: DrowsinessMachine,
    overlay: OverlayVisibility,
    gesture: GestureDetector,
    yawn: YawnDetector,
    last_frame_ms: Option<u64>,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig) -> Self {
        Self {
            eye: EyeStateEstimator::new(&config),
            timer: ClosureTimer::new(),
            drowsiness: DrowsinessMachine::new(config.drowsiness_threshold_ms),
            overlay: OverlayVisibility::new(&config),
            gesture: GestureDetector::new(&config),
            yawn: YawnDetector::new(&config),
            selected_face: None,
            last_frame_ms: None,
            config,
        }
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Analyze one frame.
    ///
    /// While `in_challenge` is set the overlay is held hidden so no new
    /// drowsy events can be counted.
    pub fn analyze(&mut self, frame: &FrameInput, in_challenge: bool) -> DmsAnalysis {
        let now = frame.timestamp_ms;
        let dt_ms = self
            .last_frame_ms
            .map(|last| now.saturating_sub(last))
            .unwrap_or(0);
        self.last_frame_ms = Some(now);

        let target = landmarks::select_target(&frame.faces, self.selected_face);
        let mut analysis = DmsAnalysis {
            face_detected: !frame.faces.is_empty(),
            face_count: frame.faces.len(),
            target_face: target,
            ..Default::default()
        };

        let Some(face) = target.and_then(|i| frame.faces.get(i)) else {
            analysis.events = self.reset_tracking();
            analysis.overlay = self.current_overlay();
            return analysis;
        };

        let ears = face
            .eye_aspect_ratio(&landmarks::LEFT_EYE)
            .and_then(|left| Ok((left, face.eye_aspect_ratio(&landmarks::RIGHT_EYE)?)));
        let (ear_left, ear_right) = match ears {
            Ok(ears) => ears,
            Err(e) => {
                debug!(error = %e, "Eye landmarks unusable, resetting closure state");
                analysis.events = self.reset_tracking();
                analysis.overlay = self.current_overlay();
                return analysis;
            }
        };

        let mut events = Vec::new();

        // Eye closure and drowsiness
        let eye = self
            .eye
            .estimate(ear_left, ear_right, frame.eye_reading.as_ref());
        let closure = *self.timer.update(eye.closed, now);
        let closed_for = closure.closed_duration_ms(now);
        if let Some(transition) = self.drowsiness.update(eye.closed, closed_for) {
            events.push(transition.into());
        }

        // Overlay
        let overlay = if in_challenge {
            self.overlay.force_hide()
        } else {
            self.overlay.update(
                eye.closed,
                closed_for,
                closure.since_last_closed_ms(now),
                dt_ms,
            )
        };
        if overlay.became_visible {
            events.push(DmsEvent::OverlayShown);
        } else if overlay.became_hidden {
            events.push(DmsEvent::OverlayHidden);
        }

        // Head tilt
        let tilt_rad = face.cheek_tilt().ok();
        if let Some(trigger) = self.gesture.update(tilt_rad, eye.closed, now) {
            events.push(DmsEvent::TiltGesture(trigger));
        }

        // Yawn
        let yawn = self.yawn.update(face, frame.mouth_reading.as_ref(), now);
        if let Some(cue) = yawn.cue {
            events.push(DmsEvent::Yawn(cue));
        }

        analysis.signal = Some(FrameSignal {
            timestamp_ms: now,
            eye,
            tilt_rad,
            mouth_ratio: yawn.mouth_ratio,
            yawn_probability: yawn.probability,
            mouth_label: yawn.label,
        });
        analysis.closed_for_ms = closed_for;
        analysis.phase = self.drowsiness.phase();
        analysis.overlay = overlay;
        analysis.events = events;
        analysis
    }

    /// Apply new thresholds. Toggling the eye classifier resets closure,
    /// drowsiness and overlay state; the returned events report what was cleared.
    pub fn update_config(&mut self, config: DmsConfig) -> Vec<DmsEvent> {
        let toggled = self.eye.apply_config(&config);
        self.drowsiness.set_threshold(config.drowsiness_threshold_ms);
        self.overlay.apply_config(&config);
        self.gesture.apply_config(&config);
        self.yawn.apply_config(&config);
        self.config = config;

        if toggled {
            info!(
                enabled = self.config.eye_classifier_enabled,
                "Eye classifier toggled, resetting closure state"
            );
            self.reset_tracking()
        } else {
            Vec::new()
        }
    }

    /// Choose which face to monitor (`None` = closest to the image centre)
    pub fn select_face(&mut self, index: Option<usize>) -> Vec<DmsEvent> {
        if self.selected_face == index {
            return Vec::new();
        }
        info!(?index, "Target face changed");
        self.selected_face = index;
        self.reset_tracking()
    }

    pub fn selected_face(&self) -> Option<usize> {
        self.selected_face
    }

    pub fn is_drowsy(&self) -> bool {
        self.drowsiness.is_drowsy()
    }

    pub fn overlay(&self) -> &OverlayState {
        self.overlay.state()
    }

    /// Reset driver state (on driver change)
    pub fn reset_state(&mut self) -> Vec<DmsEvent> {
        self.eye.reset();
        self.last_frame_ms = None;
        self.reset_tracking()
    }

    fn reset_tracking(&mut self) -> Vec<DmsEvent> {
        let mut events = Vec::new();
        self.timer.reset();
        if let Some(transition) = self.drowsiness.reset() {
            events.push(transition.into());
        }
        if self.overlay.force_hide().became_hidden {
            events.push(DmsEvent::OverlayHidden);
        }
        self.gesture.reset();
        self.yawn.reset();
        events
    }

    fn current_overlay(&self) -> OverlayUpdate {
        let state = self.overlay.state();
        OverlayUpdate {
            showing: state.showing,
            fade: state.fade,
            ..Default::default()
        }
    }
}
