//! Closure timer and drowsiness state machine
//!
//! The timer has no grace period: any open frame clears it. Hysteresis
//! lives in [`crate::overlay`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{ClosurePhase, EyeClosureState};

/// Tracks the current unbroken eye closure
#[derive(Debug, Clone, Default)]
pub struct ClosureTimer {
    state: EyeClosureState,
}

impl ClosureTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, closed: bool, now_ms: u64) -> &EyeClosureState {
        if closed {
            if self.state.closed_since_ms.is_none() {
                debug!(now_ms, "Eye closure started");
                self.state.closed_since_ms = Some(now_ms);
            }
            self.state.last_closed_ms = Some(now_ms);
        } else {
            self.state.closed_since_ms = None;
        }
        self.state.is_closed = closed;
        &self.state
    }

    pub fn state(&self) -> &EyeClosureState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = EyeClosureState::default();
    }
}

/// Edge of the drowsy state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrowsyTransition {
    Entered,
    Exited,
}

/// OPEN → CLOSING → DROWSY machine driven by the closure timer
#[derive(Debug, Clone)]
pub struct DrowsinessMachine {
    phase: ClosurePhase,
    threshold_ms: u64,
}

impl DrowsinessMachine {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            phase: ClosurePhase::Open,
            threshold_ms,
        }
    }

    pub fn set_threshold(&mut self, threshold_ms: u64) {
        self.threshold_ms = threshold_ms;
    }

    /// Advance the machine; returns the drowsy edge crossed this frame, if any
    pub fn update(&mut self, closed: bool, closed_duration_ms: u64) -> Option<DrowsyTransition> {
        let was_drowsy = self.is_drowsy();
        self.phase = if !closed {
            ClosurePhase::Open
        } else if closed_duration_ms >= self.threshold_ms {
            ClosurePhase::Drowsy
        } else {
            ClosurePhase::Closing
        };

        match (was_drowsy, self.is_drowsy()) {
            (false, true) => {
                info!(closed_duration_ms, "Drowsiness detected");
                Some(DrowsyTransition::Entered)
            }
            (true, false) => {
                info!("Drowsiness cleared");
                Some(DrowsyTransition::Exited)
            }
            _ => None,
        }
    }

    pub fn phase(&self) -> ClosurePhase {
        self.phase
    }

    pub fn is_drowsy(&self) -> bool {
        self.phase == ClosurePhase::Drowsy
    }

    /// Force back to OPEN, reporting the exit edge if the driver was drowsy
    pub fn reset(&mut self) -> Option<DrowsyTransition> {
        let was_drowsy = self.is_drowsy();
        self.phase = ClosurePhase::Open;
        was_drowsy.then_some(DrowsyTransition::Exited)
    }
}
