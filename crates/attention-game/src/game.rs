//! Sequence-recall state machine
//!
//! IDLE → READY → PLAYBACK → INPUT → (ROUND_COMPLETE → PLAYBACK) | PASS | FAIL.
//! PASS and FAIL tear the game down immediately; the outcome is reported once.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{ChallengeConfig, ChallengeError};

/// Phase shown to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePhase {
    #[default]
    Idle,
    Ready,
    Playback,
    Input,
    RoundComplete,
    Pass,
    Fail,
}

/// Why a challenge failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    WrongPad,
    TimeUp,
}

impl FailReason {
    pub fn message(&self) -> &'static str {
        match self {
            FailReason::WrongPad => "Fail: Wrong pad",
            FailReason::TimeUp => "Fail: Time up",
        }
    }
}

/// Terminal result of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Passed,
    Failed(FailReason),
}

/// Snapshot for the challenge screen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChallengeUi {
    pub phase: ChallengePhase,
    pub message: String,
    pub round: u32,
    /// Whole seconds left on the countdown once started
    pub seconds_remaining: Option<u64>,
    /// Pad lit during playback
    pub flashing_pad: Option<u8>,
    pub sequence_length: usize,
    pub progress: usize,
}

/// UI change plus the terminal outcome when the game just ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeUpdate {
    pub ui: ChallengeUi,
    pub outcome: Option<ChallengeOutcome>,
}

impl ChallengeUpdate {
    fn progress(ui: ChallengeUi) -> Self {
        Self { ui, outcome: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Playback { started_ms: u64 },
    Input,
    RoundComplete { until_ms: u64 },
}

#[derive(Debug, Clone)]
struct ActiveGame {
    phase: Phase,
    sequence: Vec<u8>,
    progress: usize,
    round: u32,
    deadline_ms: Option<u64>,
    last_seconds: Option<u64>,
    /// Playback step last reported to the host
    last_step: Option<usize>,
}

impl ActiveGame {
    /// Index into the sequence lit at `now_ms`, while playing back
    fn flash_step(&self, now_ms: u64, flash_interval_ms: u64) -> Option<usize> {
        let Phase::Playback { started_ms } = self.phase else {
            return None;
        };
        let step = (now_ms.saturating_sub(started_ms) / flash_interval_ms.max(1)) as usize;
        (step < self.sequence.len()).then_some(step)
    }
}

/// Attention challenge driven by explicit timestamps
pub struct AttentionChallenge {
    config: ChallengeConfig,
    rng: StdRng,
    game: Option<ActiveGame>,
}

impl AttentionChallenge {
    pub fn new(config: ChallengeConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic sequences for replay and tests
    pub fn with_seed(config: ChallengeConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ChallengeConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            game: None,
        }
    }

    /// Takes effect from the next challenge
    pub fn set_config(&mut self, config: ChallengeConfig) {
        self.config = config;
    }

    pub fn is_active(&self) -> bool {
        self.game.is_some()
    }

    pub fn phase(&self) -> ChallengePhase {
        match self.game.as_ref().map(|g| g.phase) {
            None => ChallengePhase::Idle,
            Some(Phase::Ready) => ChallengePhase::Ready,
            Some(Phase::Playback { .. }) => ChallengePhase::Playback,
            Some(Phase::Input) => ChallengePhase::Input,
            Some(Phase::RoundComplete { .. }) => ChallengePhase::RoundComplete,
        }
    }

    /// Sequence of the current round (empty before Start)
    pub fn sequence(&self) -> &[u8] {
        self.game
            .as_ref()
            .map(|g| g.sequence.as_slice())
            .unwrap_or_default()
    }

    /// Open the challenge screen
    pub fn enter(&mut self) -> Result<ChallengeUi, ChallengeError> {
        if self.game.is_some() {
            return Err(ChallengeError::AlreadyActive);
        }
        info!("Attention challenge entered");
        self.game = Some(ActiveGame {
            phase: Phase::Ready,
            sequence: Vec::new(),
            progress: 0,
            round: 1,
            deadline_ms: None,
            last_seconds: None,
            last_step: None,
        });
        Ok(self.ui(0))
    }

    /// Driver pressed Start: begin the countdown and the first playback
    pub fn start(&mut self, now_ms: u64) -> Result<ChallengeUi, ChallengeError> {
        let length = self.config.sequence_length(1);
        let sequence = self.make_sequence(length);
        let time_limit_ms = self.config.time_limit_ms;

        let game = self.game.as_mut().ok_or(ChallengeError::NotActive)?;
        if game.phase != Phase::Ready {
            return Err(ChallengeError::NotReady);
        }
        game.round = 1;
        game.sequence = sequence;
        game.progress = 0;
        game.deadline_ms = Some(now_ms + time_limit_ms);
        game.phase = Phase::Playback { started_ms: now_ms };
        debug!(length, "Challenge started");

        let ui = self.ui(now_ms);
        let flash_interval_ms = self.config.flash_interval_ms;
        if let Some(game) = self.game.as_mut() {
            game.last_seconds = ui.seconds_remaining;
            game.last_step = game.flash_step(now_ms, flash_interval_ms);
        }
        Ok(ui)
    }

    /// Driver pressed a pad. `Ok(None)` when the press is ignored.
    pub fn press(&mut self, pad: u8, now_ms: u64) -> Result<Option<ChallengeUpdate>, ChallengeError> {
        if pad >= self.config.pad_count {
            return Err(ChallengeError::InvalidPad {
                pad,
                pad_count: self.config.pad_count,
            });
        }
        if self.game.is_none() {
            return Err(ChallengeError::NotActive);
        }
        if let Some(update) = self.check_deadline(now_ms) {
            return Ok(Some(update));
        }
        // Playback may have ended between ticks
        self.advance(now_ms);

        let rounds_to_pass = self.config.rounds_to_pass;
        let round_pause_ms = self.config.round_pause_ms;
        let Some(game) = self.game.as_mut() else {
            return Err(ChallengeError::NotActive);
        };
        if game.phase != Phase::Input {
            debug!(pad, "Pad press outside input phase ignored");
            return Ok(None);
        }

        if game.sequence.get(game.progress) != Some(&pad) {
            return Ok(Some(self.finish(ChallengeOutcome::Failed(FailReason::WrongPad))));
        }
        game.progress += 1;
        if game.progress < game.sequence.len() {
            return Ok(Some(ChallengeUpdate::progress(self.ui(now_ms))));
        }

        if game.round >= rounds_to_pass {
            return Ok(Some(self.finish(ChallengeOutcome::Passed)));
        }
        debug!(round = game.round, "Challenge round complete");
        game.phase = Phase::RoundComplete {
            until_ms: now_ms + round_pause_ms,
        };
        Ok(Some(ChallengeUpdate::progress(self.ui(now_ms))))
    }

    /// Advance timers; returns an update when the screen changed
    pub fn tick(&mut self, now_ms: u64) -> Option<ChallengeUpdate> {
        self.game.as_ref()?;
        if let Some(update) = self.check_deadline(now_ms) {
            return Some(update);
        }
        let before = self.phase();
        self.advance(now_ms);

        let ui = self.ui(now_ms);
        let flash_interval_ms = self.config.flash_interval_ms;
        let game = self.game.as_mut()?;
        let step = game.flash_step(now_ms, flash_interval_ms);
        let seconds_changed = game.last_seconds != ui.seconds_remaining;
        // Repeated pads still get one update per flash
        let step_changed = game.last_step != step;
        game.last_seconds = ui.seconds_remaining;
        game.last_step = step;
        (before != ui.phase || seconds_changed || step_changed)
            .then(|| ChallengeUpdate::progress(ui))
    }

    /// Leave without passing or failing
    pub fn exit(&mut self) -> bool {
        let was_active = self.game.take().is_some();
        if was_active {
            info!("Attention challenge exited");
        }
        was_active
    }

    /// Current screen state
    pub fn ui(&self, now_ms: u64) -> ChallengeUi {
        let Some(game) = &self.game else {
            return ChallengeUi::default();
        };
        let (phase, message, flashing_pad) = match game.phase {
            Phase::Ready => (ChallengePhase::Ready, "Press Start when ready", None),
            Phase::Playback { .. } => {
                let pad = game
                    .flash_step(now_ms, self.config.flash_interval_ms)
                    .and_then(|step| game.sequence.get(step).copied());
                (ChallengePhase::Playback, "Watch…", pad)
            }
            Phase::Input => (ChallengePhase::Input, "Your turn!", None),
            Phase::RoundComplete { .. } => (ChallengePhase::RoundComplete, "Round complete", None),
        };
        ChallengeUi {
            phase,
            message: message.to_string(),
            round: game.round,
            seconds_remaining: game
                .deadline_ms
                .map(|deadline| deadline.saturating_sub(now_ms).div_ceil(1000)),
            flashing_pad,
            sequence_length: game.sequence.len(),
            progress: game.progress,
        }
    }

    fn check_deadline(&mut self, now_ms: u64) -> Option<ChallengeUpdate> {
        let deadline = self.game.as_ref()?.deadline_ms?;
        (now_ms >= deadline).then(|| self.finish(ChallengeOutcome::Failed(FailReason::TimeUp)))
    }

    fn advance(&mut self, now_ms: u64) {
        let next_length = self
            .game
            .as_ref()
            .map(|g| self.config.sequence_length(g.round + 1))
            .unwrap_or(0);
        let Some(phase) = self.game.as_ref().map(|g| g.phase) else {
            return;
        };

        match phase {
            Phase::Playback { started_ms } => {
                let Some(game) = self.game.as_mut() else {
                    return;
                };
                let duration = game.sequence.len() as u64 * self.config.flash_interval_ms;
                if now_ms >= started_ms + duration {
                    game.phase = Phase::Input;
                    game.progress = 0;
                }
            }
            Phase::RoundComplete { until_ms } if now_ms >= until_ms => {
                let sequence = self.make_sequence(next_length);
                if let Some(game) = self.game.as_mut() {
                    game.round += 1;
                    game.sequence = sequence;
                    game.progress = 0;
                    game.phase = Phase::Playback { started_ms: now_ms };
                    debug!(round = game.round, length = next_length, "Next round playback");
                }
            }
            _ => {}
        }
    }

    fn finish(&mut self, outcome: ChallengeOutcome) -> ChallengeUpdate {
        let round = self.game.take().map(|g| g.round).unwrap_or(1);
        let (phase, message) = match outcome {
            ChallengeOutcome::Passed => (ChallengePhase::Pass, "Passed"),
            ChallengeOutcome::Failed(reason) => (ChallengePhase::Fail, reason.message()),
        };
        info!(?outcome, round, "Attention challenge finished");
        ChallengeUpdate {
            ui: ChallengeUi {
                phase,
                message: message.to_string(),
                round,
                ..Default::default()
            },
            outcome: Some(outcome),
        }
    }

    fn make_sequence(&mut self, length: usize) -> Vec<u8> {
        let pads = self.config.pad_count.max(1);
        (0..length).map(|_| self.rng.gen_range(0..pads)).collect()
    }
}
