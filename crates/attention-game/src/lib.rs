//! Attention Challenge
//!
//! Short sequence-recall game the driver must pass after repeated drowsy
//! events: watch a sequence of pad flashes, then repeat it.

mod config;
mod game;

pub use config::ChallengeConfig;
pub use game::{
    AttentionChallenge, ChallengeOutcome, ChallengePhase, ChallengeUi, ChallengeUpdate,
    FailReason,
};

use thiserror::Error;

/// Invalid challenge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("No challenge in progress")]
    NotActive,

    #[error("Challenge already in progress")]
    AlreadyActive,

    #[error("Challenge can only be started from the ready screen")]
    NotReady,

    #[error("Pad {pad} does not exist (pads: {pad_count})")]
    InvalidPad { pad: u8, pad_count: u8 },
}
