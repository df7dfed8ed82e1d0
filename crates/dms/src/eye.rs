//! Eye-state estimation
//!
//! Exactly one pathway decides per frame: the smoothed classifier probability
//! when the classifier is enabled and produced a usable reading this frame,
//! otherwise the geometric eye aspect ratio.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::smoothing::MovingAverage;
use crate::DmsConfig;

/// Raw eye classifier output for one frame (probability that each eye is closed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeReading {
    pub left: f32,
    /// Some models emit a single value; the left value is reused then
    #[serde(default)]
    pub right: Option<f32>,
}

impl EyeReading {
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left,
            right: Some(right),
        }
    }

    fn pair(&self) -> (f32, f32) {
        (self.left, self.right.unwrap_or(self.left))
    }
}

/// Which signal drove the closed decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pathway", rename_all = "snake_case")]
pub enum EyePathway {
    /// Mean eye aspect ratio compared against the ratio threshold
    Geometry { ear: f32 },
    /// Smoothed per-eye closed probabilities compared against the classifier threshold
    Classifier { left: f32, right: f32 },
}

/// Per-frame closed/open decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeDecision {
    pub closed: bool,
    pub ear_left: f32,
    pub ear_right: f32,
    pub pathway: EyePathway,
}

/// Eye-state estimator
#[derive(Debug, Clone)]
pub struct EyeStateEstimator {
    ear_threshold: f32,
    classifier_enabled: bool,
    classifier_threshold: f32,
    left: MovingAverage,
    right: MovingAverage,
}

impl EyeStateEstimator {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            ear_threshold: config.ear_threshold,
            classifier_enabled: config.eye_classifier_enabled,
            classifier_threshold: config.eye_classifier_threshold,
            left: MovingAverage::new(config.eye_smoothing_window),
            right: MovingAverage::new(config.eye_smoothing_window),
        }
    }

    /// Apply new thresholds. Returns true when the classifier toggle flipped,
    /// in which case smoothing history is discarded.
    pub fn apply_config(&mut self, config: &DmsConfig) -> bool {
        let toggled = self.classifier_enabled != config.eye_classifier_enabled;
        let resized = self.left.len() > config.eye_smoothing_window.max(1);
        self.ear_threshold = config.ear_threshold;
        self.classifier_enabled = config.eye_classifier_enabled;
        self.classifier_threshold = config.eye_classifier_threshold;
        if toggled || resized {
            self.left = MovingAverage::new(config.eye_smoothing_window);
            self.right = MovingAverage::new(config.eye_smoothing_window);
        }
        toggled
    }

    /// Decide whether the eyes are closed this frame
    pub fn estimate(
        &mut self,
        ear_left: f32,
        ear_right: f32,
        reading: Option<&EyeReading>,
    ) -> EyeDecision {
        let pathway = self.select_pathway(ear_left, ear_right, reading);
        let closed = match pathway {
            EyePathway::Geometry { ear } => ear < self.ear_threshold,
            EyePathway::Classifier { left, right } => {
                (left + right) / 2.0 >= self.classifier_threshold
            }
        };
        EyeDecision {
            closed,
            ear_left,
            ear_right,
            pathway,
        }
    }

    fn select_pathway(
        &mut self,
        ear_left: f32,
        ear_right: f32,
        reading: Option<&EyeReading>,
    ) -> EyePathway {
        let geometry = EyePathway::Geometry {
            ear: (ear_left + ear_right) / 2.0,
        };
        if !self.classifier_enabled {
            return geometry;
        }
        let Some(reading) = reading else {
            return geometry;
        };

        let (p_left, p_right) = reading.pair();
        if !p_left.is_finite() || !p_right.is_finite() {
            warn!("Eye classifier produced a non-finite probability, using geometry this frame");
            return geometry;
        }
        EyePathway::Classifier {
            left: self.left.push(p_left),
            right: self.right.push(p_right),
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
