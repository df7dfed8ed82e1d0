//! Driver state tracking

use serde::{Deserialize, Serialize};

use crate::gesture::TiltSide;

/// Phase of the closure/drowsiness state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClosurePhase {
    /// Eyes open, no timer running
    #[default]
    Open,
    /// Eyes closed, timer running but below the drowsiness threshold
    Closing,
    /// Eyes closed for at least the drowsiness threshold
    Drowsy,
}

/// Continuous eye-closure bookkeeping.
///
/// `closed_since_ms` is only ever set while `is_closed` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EyeClosureState {
    pub is_closed: bool,
    /// Onset of the current unbroken closure
    pub closed_since_ms: Option<u64>,
    /// Last frame at which the eyes were seen closed
    pub last_closed_ms: Option<u64>,
}

impl EyeClosureState {
    /// Length of the current unbroken closure (0 when open)
    pub fn closed_duration_ms(&self, now_ms: u64) -> u64 {
        self.closed_since_ms
            .map(|since| now_ms.saturating_sub(since))
            .unwrap_or(0)
    }

    /// Time since eyes were last seen closed
    pub fn since_last_closed_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_closed_ms.map(|t| now_ms.saturating_sub(t))
    }
}

/// Debounced overlay visibility
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverlayState {
    pub showing: bool,
    /// Render opacity in [0, 1]
    pub fade: f32,
}

/// Head-tilt hold bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TiltHoldState {
    pub side: Option<TiltSide>,
    pub hold_start_ms: Option<u64>,
}

impl TiltHoldState {
    pub fn held_ms(&self, now_ms: u64) -> u64 {
        self.hold_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Yawn gate hold bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YawnHoldState {
    pub hold_start_ms: Option<u64>,
}

impl YawnHoldState {
    pub fn held_ms(&self, now_ms: u64) -> u64 {
        self.hold_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.hold_start_ms = None;
    }
}
