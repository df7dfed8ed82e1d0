//! Safety gate
//!
//! Once drowsy events pile up the driver must stop the vehicle before the
//! attention challenge opens. The banner is visible in every state but
//! `Idle`; manual proceed is accepted whenever it is visible.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Nothing pending
    #[default]
    Idle,
    /// Waiting for the stop detector to resolve
    AwaitingStop,
    /// The wait failed; only manual proceed opens the challenge
    ManualPrompt,
}

#[derive(Debug, Clone)]
pub struct SafetyGate {
    threshold: u32,
    state: GateState,
}

impl SafetyGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            state: GateState::Idle,
        }
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn banner_visible(&self) -> bool {
        self.state != GateState::Idle
    }

    pub fn is_awaiting_stop(&self) -> bool {
        self.state == GateState::AwaitingStop
    }

    /// Called after each counter increment. Returns true when a stop wait
    /// should begin; the gate is then `AwaitingStop`.
    pub fn on_increment(&mut self, count: u32, in_challenge: bool) -> bool {
        if in_challenge || count <= self.threshold || self.is_awaiting_stop() {
            return false;
        }
        info!(count, threshold = self.threshold, "Drowsy events over threshold, requesting stop");
        self.state = GateState::AwaitingStop;
        true
    }

    /// Vehicle confirmed stopped
    pub fn wait_succeeded(&mut self) -> bool {
        if !self.is_awaiting_stop() {
            return false;
        }
        info!("Stop confirmed, opening challenge");
        self.state = GateState::Idle;
        true
    }

    /// Wait failed or timed out
    pub fn wait_failed(&mut self) {
        if self.is_awaiting_stop() {
            warn!("Stop wait failed, manual proceed required");
            self.state = GateState::ManualPrompt;
        }
    }

    /// Driver chose to proceed. Returns false when no banner is showing.
    pub fn proceed_manually(&mut self) -> bool {
        if !self.banner_visible() {
            debug!("Manual proceed without banner ignored");
            return false;
        }
        info!(from = ?self.state, "Manual proceed");
        self.state = GateState::Idle;
        true
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }
}
