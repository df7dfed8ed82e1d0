//! Head-tilt gesture detection
//!
//! A tilt only counts while the eyes are closed. The same side must be held
//! for the hold duration, the cooldown since the previous firing must have
//! elapsed, and no earlier gesture animation may still be running.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::TiltHoldState;
use crate::DmsConfig;

/// Direction of a head tilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltSide {
    Left,
    Right,
}

/// Classify a cheek-line angle against a symmetric threshold (radians)
pub fn classify_tilt(angle_rad: f32, threshold_rad: f32) -> Option<TiltSide> {
    if angle_rad > threshold_rad {
        Some(TiltSide::Right)
    } else if angle_rad < -threshold_rad {
        Some(TiltSide::Left)
    } else {
        None
    }
}

/// One-shot gesture firing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureTrigger {
    pub side: TiltSide,
    pub timestamp_ms: u64,
}

/// Tilt-while-closed gesture detector
#[derive(Debug, Clone)]
pub struct GestureDetector {
    threshold_rad: f32,
    hold_ms: u64,
    cooldown_ms: u64,
    animation_ms: u64,
    hold: TiltHoldState,
    last_fired_ms: Option<u64>,
    animation_until_ms: Option<u64>,
}

impl GestureDetector {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            threshold_rad: config.tilt_threshold_rad(),
            hold_ms: config.tilt_hold_ms,
            cooldown_ms: config.tilt_cooldown_ms,
            animation_ms: config.gesture_animation_ms,
            hold: TiltHoldState::default(),
            last_fired_ms: None,
            animation_until_ms: None,
        }
    }

    pub fn apply_config(&mut self, config: &DmsConfig) {
        self.threshold_rad = config.tilt_threshold_rad();
        self.hold_ms = config.tilt_hold_ms;
        self.cooldown_ms = config.tilt_cooldown_ms;
        self.animation_ms = config.gesture_animation_ms;
    }

    /// Feed one frame. `angle_rad` is `None` when the cheek landmarks are missing.
    pub fn update(
        &mut self,
        angle_rad: Option<f32>,
        eyes_closed: bool,
        now_ms: u64,
    ) -> Option<GestureTrigger> {
        if self.animation_until_ms.is_some_and(|until| now_ms >= until) {
            self.animation_until_ms = None;
        }

        let side = angle_rad.and_then(|angle| classify_tilt(angle, self.threshold_rad));
        let side = match side {
            Some(side) if eyes_closed => side,
            _ => {
                self.hold.reset();
                return None;
            }
        };

        if self.hold.side != Some(side) {
            debug!(?side, now_ms, "Tilt hold started");
            self.hold.side = Some(side);
            self.hold.hold_start_ms = Some(now_ms);
        }

        let held = self.hold.held_ms(now_ms) >= self.hold_ms;
        let cooled = self
            .last_fired_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms);
        if !held || !cooled || self.is_animating() {
            return None;
        }

        info!(?side, now_ms, "Head-tilt gesture triggered");
        self.last_fired_ms = Some(now_ms);
        self.animation_until_ms = Some(now_ms + self.animation_ms);
        self.hold.reset();
        Some(GestureTrigger {
            side,
            timestamp_ms: now_ms,
        })
    }

    pub fn hold_state(&self) -> &TiltHoldState {
        &self.hold
    }

    pub fn is_animating(&self) -> bool {
        self.animation_until_ms.is_some()
    }

    /// Clear the hold; cooldown bookkeeping survives
    pub fn reset(&mut self) {
        self.hold.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RIGHT: f32 = 0.4;
    const LEFT: f32 = -0.4;

    fn detector() -> GestureDetector {
        GestureDetector::new(&DmsConfig::default())
    }

    #[test]
    fn test_classify_tilt() {
        let thr = 12f32.to_radians();
        assert_eq!(classify_tilt(0.3, thr), Some(TiltSide::Right));
        assert_eq!(classify_tilt(-0.3, thr), Some(TiltSide::Left));
        assert_eq!(classify_tilt(0.1, thr), None);
    }

    #[test]
    fn test_fires_after_hold() {
        let mut det = detector();
        assert!(det.update(Some(RIGHT), true, 0).is_none());
        assert!(det.update(Some(RIGHT), true, 1_000).is_none());
        let trigger = det.update(Some(RIGHT), true, 1_500).unwrap();
        assert_eq!(trigger.side, TiltSide::Right);
        assert_eq!(trigger.timestamp_ms, 1_500);
        assert!(det.is_animating());
    }

    #[test]
    fn test_requires_closed_eyes() {
        let mut det = detector();
        for t in (0..3_000).step_by(100) {
            assert!(det.update(Some(RIGHT), false, t).is_none());
        }
    }

    #[test]
    fn test_cooldown_between_firings() {
        let mut det = detector();
        det.update(Some(LEFT), true, 0);
        assert!(det.update(Some(LEFT), true, 1_500).is_some());
        // Hold re-armed at 1_600, held by 3_100, but cooldown ends at 4_000
        det.update(Some(LEFT), true, 1_600);
        assert!(det.update(Some(LEFT), true, 3_100).is_none());
        assert!(det.update(Some(LEFT), true, 4_000).is_some());
    }

    #[test]
    fn test_missing_angle_resets_hold() {
        let mut det = detector();
        det.update(Some(RIGHT), true, 0);
        det.update(None, true, 500);
        assert_eq!(det.hold_state().hold_start_ms, None);
        assert!(det.update(Some(RIGHT), true, 1_500).is_none());
    }

    proptest! {
        #[test]
        fn prop_side_change_or_opening_resets_hold(
            frames in proptest::collection::vec((prop_oneof![Just(LEFT), Just(RIGHT), Just(0.0f32)], any::<bool>()), 1..120)
        ) {
            let mut det = detector();
            let mut prev_side: Option<TiltSide> = None;
            for (i, (angle, closed)) in frames.into_iter().enumerate() {
                let now = i as u64 * 50;
                let fired = det.update(Some(angle), closed, now).is_some();
                let side = classify_tilt(angle, det.threshold_rad);
                let hold = *det.hold_state();
                if !closed || side.is_none() {
                    prop_assert_eq!(hold, TiltHoldState::default());
                } else if side != prev_side && !fired {
                    prop_assert_eq!(hold.hold_start_ms, Some(now));
                }
                prev_side = hold.side;
            }
        }
    }
}
