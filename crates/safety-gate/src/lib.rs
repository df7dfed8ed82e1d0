//! Safety Gate
//!
//! Counts drowsy events, gates the attention challenge on a confirmed
//! vehicle stop and ties every detector together in [`DrowsinessEngine`].

mod config;
mod counter;
mod effect;
mod engine;
mod gate;

pub use config::EngineConfig;
pub use counter::DrowsyEventCounter;
pub use effect::{EngineEffect, IncidentReport, DROWSY_MESSAGE};
pub use engine::DrowsinessEngine;
pub use gate::{GateState, SafetyGate};

use attention_game::ChallengeError;
use thiserror::Error;

/// Engine error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Challenge error: {0}")]
    Challenge(#[from] ChallengeError),
}
