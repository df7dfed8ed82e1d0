//! Challenge configuration

use serde::{Deserialize, Serialize};

/// Attention challenge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Number of pads to choose from
    pub pad_count: u8,

    /// Sequence length in the first round
    pub base_length: usize,

    /// Rounds that must be completed to pass
    pub rounds_to_pass: u32,

    /// Global countdown from Start (milliseconds)
    pub time_limit_ms: u64,

    /// Interval between flashed pads during playback (milliseconds)
    pub flash_interval_ms: u64,

    /// Pause between a completed round and the next playback (milliseconds)
    pub round_pause_ms: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            pad_count: 4,
            base_length: 3,
            rounds_to_pass: 2,
            time_limit_ms: 45_000,
            flash_interval_ms: 650,
            round_pause_ms: 600,
        }
    }
}

impl ChallengeConfig {
    /// Create strict config (longer sequences, less time)
    pub fn strict() -> Self {
        Self {
            base_length: 4,
            rounds_to_pass: 3,
            time_limit_ms: 40_000,
            ..Default::default()
        }
    }

    /// Create lenient config (single short round)
    pub fn lenient() -> Self {
        Self {
            rounds_to_pass: 1,
            time_limit_ms: 60_000,
            flash_interval_ms: 800,
            ..Default::default()
        }
    }

    /// Sequence length for a 1-based round
    pub fn sequence_length(&self, round: u32) -> usize {
        self.base_length + round.saturating_sub(1) as usize
    }
}
