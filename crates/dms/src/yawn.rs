//! Yawn detection
//!
//! With the mouth classifier enabled and a usable reading, a yawn needs the
//! smoothed yawn probability and the mouth-open ratio to pass their gates
//! together for the minimum hold. Otherwise the mouth-open ratio alone
//! triggers immediately. Both paths share the cooldown and the cue lock.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::landmarks::{FaceLandmarks, Point};
use crate::smoothing::{MovingAverage, VectorMovingAverage};
use crate::state::YawnHoldState;
use crate::DmsConfig;

const OPEN_MOUTH_RATIO: f32 = 0.25;
const YAWN_CLASS_INDEX: usize = 3;

/// Raw mouth classifier output: a binary probability or a class vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MouthReading {
    Scalar(f32),
    Vector(Vec<f32>),
}

/// Descriptive mouth state for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthLabel {
    #[default]
    Neutral,
    Open,
    Smile,
    Yawn,
    NotYawning,
}

impl MouthLabel {
    const CLASSES: [MouthLabel; 4] = [
        MouthLabel::Neutral,
        MouthLabel::Open,
        MouthLabel::Smile,
        MouthLabel::Yawn,
    ];
}

/// One-shot yawn cue anchored at the mouth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawnCue {
    pub position: Option<Point>,
    pub timestamp_ms: u64,
}

/// Per-frame yawn detector output
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YawnOutcome {
    pub label: MouthLabel,
    /// Smoothed yawn probability when the classifier path was used
    pub probability: Option<f32>,
    pub mouth_ratio: Option<f32>,
    pub cue: Option<YawnCue>,
}

/// Classifier reading reduced to a yawn probability
enum Interpreted {
    Binary(f32),
    MultiClass { yawn: f32, label: MouthLabel },
}

/// Hold/cooldown yawn detector
#[derive(Debug, Clone)]
pub struct YawnDetector {
    classifier_enabled: bool,
    probability_threshold: f32,
    ratio_threshold: f32,
    min_mouth_ratio: f32,
    min_hold_ms: u64,
    cooldown_ms: u64,
    cue_ms: u64,
    smoothing_window: usize,
    scalar: MovingAverage,
    vector: VectorMovingAverage,
    last_arity: Option<usize>,
    hold: YawnHoldState,
    last_yawn_ms: Option<u64>,
    cue_until_ms: Option<u64>,
}

impl YawnDetector {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            classifier_enabled: config.mouth_classifier_enabled,
            probability_threshold: config.yawn_probability_threshold,
            ratio_threshold: config.yawn_ratio_threshold,
            min_mouth_ratio: config.yawn_min_mouth_ratio,
            min_hold_ms: config.yawn_min_hold_ms,
            cooldown_ms: config.yawn_cooldown_ms,
            cue_ms: config.yawn_cue_ms,
            smoothing_window: config.mouth_smoothing_window,
            scalar: MovingAverage::new(config.mouth_smoothing_window),
            vector: VectorMovingAverage::new(config.mouth_smoothing_window),
            last_arity: None,
            hold: YawnHoldState::default(),
            last_yawn_ms: None,
            cue_until_ms: None,
        }
    }

    /// Smoothing history survives unless the classifier is toggled or the
    /// window size changes
    pub fn apply_config(&mut self, config: &DmsConfig) {
        let toggled = self.classifier_enabled != config.mouth_classifier_enabled;
        let resized = self.smoothing_window != config.mouth_smoothing_window;

        self.classifier_enabled = config.mouth_classifier_enabled;
        self.probability_threshold = config.yawn_probability_threshold;
        self.ratio_threshold = config.yawn_ratio_threshold;
        self.min_mouth_ratio = config.yawn_min_mouth_ratio;
        self.min_hold_ms = config.yawn_min_hold_ms;
        self.cooldown_ms = config.yawn_cooldown_ms;
        self.cue_ms = config.yawn_cue_ms;
        self.smoothing_window = config.mouth_smoothing_window;

        if resized {
            self.scalar = MovingAverage::new(self.smoothing_window);
            self.vector = VectorMovingAverage::new(self.smoothing_window);
        }
        if toggled || resized {
            self.reset();
        }
    }

    /// Feed one frame of the target face
    pub fn update(
        &mut self,
        face: &FaceLandmarks,
        reading: Option<&MouthReading>,
        now_ms: u64,
    ) -> YawnOutcome {
        if self.cue_until_ms.is_some_and(|until| now_ms >= until) {
            self.cue_until_ms = None;
        }

        let Ok(ratio) = face.mouth_open_ratio() else {
            self.hold.reset();
            return YawnOutcome::default();
        };

        let interpreted = reading
            .filter(|_| self.classifier_enabled)
            .and_then(|reading| self.interpret(reading));

        match interpreted {
            Some(Interpreted::Binary(probability)) => {
                let gate = self.gate(probability, ratio);
                let label = if gate {
                    MouthLabel::Yawn
                } else {
                    MouthLabel::NotYawning
                };
                self.classified(face, gate, label, probability, ratio, now_ms)
            }
            Some(Interpreted::MultiClass { yawn, label }) => {
                let gate = self.gate(yawn, ratio);
                let label = if gate { MouthLabel::Yawn } else { label };
                self.classified(face, gate, label, yawn, ratio, now_ms)
            }
            None => self.ratio_only(face, ratio, now_ms),
        }
    }

    fn gate(&self, probability: f32, ratio: f32) -> bool {
        probability >= self.probability_threshold && ratio >= self.min_mouth_ratio
    }

    fn interpret(&mut self, reading: &MouthReading) -> Option<Interpreted> {
        let raw: &[f32] = match reading {
            MouthReading::Scalar(p) => std::slice::from_ref(p),
            MouthReading::Vector(values) => values,
        };
        if raw.iter().any(|p| !p.is_finite()) {
            warn!("Mouth classifier produced a non-finite probability, using mouth ratio");
            return None;
        }

        if self.last_arity != Some(raw.len()) {
            self.scalar.reset();
            self.vector.reset();
            self.last_arity = Some(raw.len());
        }

        match raw.len() {
            1 => Some(Interpreted::Binary(self.scalar.push(raw[0]))),
            2 => Some(Interpreted::Binary(self.scalar.push(raw[1]))),
            n if n > YAWN_CLASS_INDEX => {
                let smooth = self.vector.push(raw);
                let argmax = smooth
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                Some(Interpreted::MultiClass {
                    yawn: smooth[YAWN_CLASS_INDEX],
                    label: MouthLabel::CLASSES
                        .get(argmax)
                        .copied()
                        .unwrap_or(MouthLabel::Neutral),
                })
            }
            n => {
                warn!(arity = n, "Unsupported mouth classifier output, using mouth ratio");
                None
            }
        }
    }

    fn classified(
        &mut self,
        face: &FaceLandmarks,
        gate: bool,
        label: MouthLabel,
        probability: f32,
        ratio: f32,
        now_ms: u64,
    ) -> YawnOutcome {
        let mut cue = None;
        if gate {
            if self.hold.hold_start_ms.is_none() {
                self.hold.hold_start_ms = Some(now_ms);
            }
            if self.hold.held_ms(now_ms) >= self.min_hold_ms && self.can_fire(now_ms) {
                cue = Some(self.fire(face, now_ms));
                self.hold.reset();
            }
        } else {
            self.hold.reset();
        }
        YawnOutcome {
            label,
            probability: Some(probability),
            mouth_ratio: Some(ratio),
            cue,
        }
    }

    fn ratio_only(&mut self, face: &FaceLandmarks, ratio: f32, now_ms: u64) -> YawnOutcome {
        self.hold.reset();
        let label = if ratio > self.ratio_threshold {
            MouthLabel::Yawn
        } else if ratio > OPEN_MOUTH_RATIO {
            MouthLabel::Open
        } else {
            MouthLabel::Neutral
        };
        let cue = (label == MouthLabel::Yawn && self.can_fire(now_ms))
            .then(|| self.fire(face, now_ms));
        YawnOutcome {
            label,
            probability: None,
            mouth_ratio: Some(ratio),
            cue,
        }
    }

    fn can_fire(&self, now_ms: u64) -> bool {
        let cooled = self
            .last_yawn_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms);
        cooled && self.cue_until_ms.is_none()
    }

    fn fire(&mut self, face: &FaceLandmarks, now_ms: u64) -> YawnCue {
        let position = face.mouth_center().ok().or_else(|| face.bounding_center());
        info!(now_ms, "Yawn detected");
        self.last_yawn_ms = Some(now_ms);
        self.cue_until_ms = Some(now_ms + self.cue_ms);
        YawnCue {
            position,
            timestamp_ms: now_ms,
        }
    }

    pub fn hold_state(&self) -> &YawnHoldState {
        &self.hold
    }

    /// Clear hold and smoothing; cooldown bookkeeping survives
    pub fn reset(&mut self) {
        self.hold.reset();
        self.scalar.reset();
        self.vector.reset();
        self.last_arity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::fixtures::face;

    fn classifier_detector() -> YawnDetector {
        YawnDetector::new(&DmsConfig {
            mouth_classifier_enabled: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_fallback_fires_immediately_with_cooldown() {
        let mut det = YawnDetector::new(&DmsConfig::default());
        let open = face(0.5, 0.3, 0.7, 0.0);
        let out = det.update(&open, None, 0);
        assert_eq!(out.label, MouthLabel::Yawn);
        let cue = out.cue.unwrap();
        let pos = cue.position.unwrap();
        assert!((pos.x - 0.5).abs() < 1e-6 && (pos.y - 0.62).abs() < 1e-6);

        assert!(det.update(&open, None, 2_000).cue.is_none());
        assert!(det.update(&open, None, 3_000).cue.is_some());
    }

    #[test]
    fn test_fallback_labels() {
        let mut det = YawnDetector::new(&DmsConfig::default());
        assert_eq!(det.update(&face(0.5, 0.3, 0.3, 0.0), None, 0).label, MouthLabel::Open);
        assert_eq!(det.update(&face(0.5, 0.3, 0.1, 0.0), None, 0).label, MouthLabel::Neutral);
    }

    #[test]
    fn test_classifier_requires_hold() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.5, 0.0);
        let reading = MouthReading::Scalar(0.9);
        let first = det.update(&open, Some(&reading), 0);
        assert_eq!(first.label, MouthLabel::Yawn);
        assert!(first.cue.is_none());
        assert!(det.update(&open, Some(&reading), 300).cue.is_none());
        assert!(det.update(&open, Some(&reading), 500).cue.is_some());
        assert_eq!(det.hold_state().hold_start_ms, None);
    }

    #[test]
    fn test_classifier_gate_needs_mouth_ratio() {
        let mut det = classifier_detector();
        // High probability but a nearly closed mouth
        let closed = face(0.5, 0.3, 0.1, 0.0);
        let reading = MouthReading::Scalar(0.95);
        for t in (0..2_000).step_by(100) {
            let out = det.update(&closed, Some(&reading), t);
            assert_eq!(out.label, MouthLabel::NotYawning);
            assert!(out.cue.is_none());
        }
    }

    #[test]
    fn test_multiclass_label_and_yawn_index() {
        let mut det = classifier_detector();
        let smiling = face(0.5, 0.3, 0.2, 0.0);
        let reading = MouthReading::Vector(vec![0.1, 0.1, 0.7, 0.1]);
        let out = det.update(&smiling, Some(&reading), 0);
        assert_eq!(out.label, MouthLabel::Smile);
        assert!((out.probability.unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_two_class_uses_second_entry() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.5, 0.0);
        let out = det.update(&open, Some(&MouthReading::Vector(vec![0.2, 0.8])), 0);
        assert!((out.probability.unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_arity_change_clears_history() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.5, 0.0);
        det.update(&open, Some(&MouthReading::Scalar(0.0)), 0);
        let out = det.update(&open, Some(&MouthReading::Vector(vec![0.2, 0.9])), 33);
        assert!((out.probability.unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_unrelated_config_change_keeps_smoothing() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.5, 0.0);
        det.update(&open, Some(&MouthReading::Scalar(0.0)), 0);

        det.apply_config(&DmsConfig {
            mouth_classifier_enabled: true,
            ear_threshold: 0.2,
            yawn_cooldown_ms: 5_000,
            ..Default::default()
        });
        let out = det.update(&open, Some(&MouthReading::Scalar(0.9)), 33);
        assert!((out.probability.unwrap() - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_window_change_or_toggle_clears_smoothing() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.5, 0.0);
        det.update(&open, Some(&MouthReading::Scalar(0.0)), 0);
        det.apply_config(&DmsConfig {
            mouth_classifier_enabled: true,
            mouth_smoothing_window: 3,
            ..Default::default()
        });
        let out = det.update(&open, Some(&MouthReading::Scalar(0.9)), 33);
        assert!((out.probability.unwrap() - 0.9).abs() < 1e-6);

        det.apply_config(&DmsConfig {
            mouth_classifier_enabled: false,
            mouth_smoothing_window: 3,
            ..Default::default()
        });
        det.apply_config(&DmsConfig {
            mouth_classifier_enabled: true,
            mouth_smoothing_window: 3,
            ..Default::default()
        });
        let out = det.update(&open, Some(&MouthReading::Scalar(0.3)), 66);
        assert!((out.probability.unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_unsupported_arity_falls_back_to_ratio() {
        let mut det = classifier_detector();
        let open = face(0.5, 0.3, 0.7, 0.0);
        let out = det.update(&open, Some(&MouthReading::Vector(vec![0.3, 0.3, 0.4])), 0);
        assert_eq!(out.probability, None);
        assert!(out.cue.is_some());
    }

    #[test]
    fn test_mouth_reading_deserializes_both_shapes() {
        let scalar: MouthReading = serde_json::from_str("0.4").unwrap();
        let vector: MouthReading = serde_json::from_str("[0.1, 0.2, 0.3, 0.4]").unwrap();
        assert_eq!(scalar, MouthReading::Scalar(0.4));
        assert!(matches!(vector, MouthReading::Vector(v) if v.len() == 4));
    }
}
