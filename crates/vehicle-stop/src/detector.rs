//! Vehicle stop detector
//!
//! One wait at a time. A wait ends in exactly one way: the vehicle is
//! confirmed stopped, the position source fails, the overall timeout
//! elapses, or the caller cancels it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geo::GeoFix;
use crate::speed::SpeedEstimator;
use crate::GeoError;

pub const PARK_PROMPT: &str = "Please park on the side and take the test.";

/// Stop detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfig {
    /// Speed at or below which the vehicle counts as stopped (m/s)
    pub speed_threshold_mps: f64,
    /// How long speed must stay below the threshold (milliseconds)
    pub hold_ms: u64,
    /// Overall wait timeout (milliseconds)
    pub timeout_ms: u64,
    /// Fixes older than this are ignored (milliseconds)
    pub max_fix_age_ms: u64,
    /// Fixes less accurate than this are ignored (meters)
    pub max_accuracy_m: f64,
    /// Native speeds at or above this are implausible (m/s)
    pub native_speed_ceiling_mps: f64,
    /// Derived speed needs fixes further apart than this (milliseconds)
    pub min_speed_interval_ms: u64,
    /// Derived speed needs fixes closer together than this (milliseconds)
    pub max_speed_interval_ms: u64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            speed_threshold_mps: 1.5,
            hold_ms: 5_000,
            timeout_ms: 60_000,
            max_fix_age_ms: 20_000,
            max_accuracy_m: 50.0,
            native_speed_ceiling_mps: 120.0,
            min_speed_interval_ms: 300,
            max_speed_interval_ms: 30_000,
        }
    }
}

/// Why a wait failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "failure", content = "error", rename_all = "snake_case")]
pub enum StopFailure {
    /// The position source reported an error or is missing
    Geolocation(GeoError),
    /// No confirmed stop within the timeout
    TimedOut,
}

/// Terminal result of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    Failed(StopFailure),
}

/// Status text for the park banner plus the terminal outcome, if reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopUpdate {
    pub status: String,
    pub outcome: Option<StopOutcome>,
}

impl StopUpdate {
    fn pending(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            outcome: None,
        }
    }

    fn failed(failure: StopFailure) -> Self {
        Self {
            status: failure_status(failure).to_string(),
            outcome: Some(StopOutcome::Failed(failure)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

fn failure_status(failure: StopFailure) -> &'static str {
    match failure {
        StopFailure::Geolocation(GeoError::Unsupported) => {
            "Geolocation not available. You can proceed manually."
        }
        StopFailure::Geolocation(GeoError::PermissionDenied) => {
            "Location permission denied. You can proceed manually when parked."
        }
        StopFailure::Geolocation(_) => {
            "Location unavailable. You can proceed manually when parked."
        }
        StopFailure::TimedOut => "Taking too long. You can proceed manually when parked.",
    }
}

#[derive(Debug, Clone)]
struct StopWait {
    started_ms: u64,
    speed: SpeedEstimator,
    hold_start_ms: Option<u64>,
}

/// Confirms that the vehicle has come to rest
#[derive(Debug, Clone)]
pub struct StopDetector {
    config: StopConfig,
    wait: Option<StopWait>,
}

impl StopDetector {
    pub fn new(config: StopConfig) -> Self {
        Self { config, wait: None }
    }

    pub fn config(&self) -> &StopConfig {
        &self.config
    }

    /// Takes effect from the next wait
    pub fn set_config(&mut self, config: StopConfig) {
        self.config = config;
    }

    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    /// Start waiting for the vehicle to stop.
    ///
    /// Without a position source the wait fails immediately. Calling this
    /// while a wait is in progress restarts it.
    pub fn begin(&mut self, now_ms: u64, geolocation_available: bool) -> StopUpdate {
        if !geolocation_available {
            warn!("Stop wait requested without geolocation");
            self.wait = None;
            return StopUpdate::failed(StopFailure::Geolocation(GeoError::Unsupported));
        }
        info!(now_ms, timeout_ms = self.config.timeout_ms, "Waiting for vehicle stop");
        self.wait = Some(StopWait {
            started_ms: now_ms,
            speed: SpeedEstimator::new(&self.config),
            hold_start_ms: None,
        });
        StopUpdate::pending(PARK_PROMPT)
    }

    /// Feed a position fix. Returns `None` when no wait is in progress.
    pub fn on_fix(&mut self, fix: &GeoFix, now_ms: u64) -> Option<StopUpdate> {
        if let Some(timed_out) = self.poll_timeout(now_ms) {
            return Some(timed_out);
        }
        let config = &self.config;
        let wait = self.wait.as_mut()?;

        let speed = wait.speed.estimate(fix);
        let age_ms = now_ms.saturating_sub(fix.timestamp_ms);
        let accuracy = fix.accuracy_or_unknown();

        let rejected = if age_ms > config.max_fix_age_ms {
            Some("Waiting for fresh GPS…".to_string())
        } else if accuracy > config.max_accuracy_m {
            Some(format!("Improving accuracy ({}m)…", accuracy.round()))
        } else if speed.is_none() {
            Some("Waiting for GPS fix…".to_string())
        } else {
            None
        };
        if let Some(status) = rejected {
            debug!(age_ms, accuracy, ?speed, "Fix inconclusive");
            wait.hold_start_ms = None;
            return Some(StopUpdate::pending(status));
        }

        let speed = speed.unwrap_or(f64::INFINITY);
        if speed > config.speed_threshold_mps {
            if wait.hold_start_ms.take().is_some() {
                debug!(speed, "Vehicle moving again, stop hold reset");
            }
            return Some(StopUpdate::pending(format!(
                "Speed {speed:.1} m/s. Please park and hold still…"
            )));
        }

        let hold_start = *wait.hold_start_ms.get_or_insert(now_ms);
        let held_ms = now_ms.saturating_sub(hold_start);
        if held_ms >= config.hold_ms {
            info!(held_ms, "Vehicle stop confirmed");
            self.wait = None;
            return Some(StopUpdate {
                status: "Vehicle stopped.".to_string(),
                outcome: Some(StopOutcome::Stopped),
            });
        }

        let remaining_s = (config.hold_ms - held_ms) as f64 / 1000.0;
        Some(StopUpdate::pending(format!(
            "Vehicle stopped. Hold {}s…",
            remaining_s.round()
        )))
    }

    /// Report a position source failure. Returns `None` when no wait is in progress.
    pub fn on_error(&mut self, error: GeoError) -> Option<StopUpdate> {
        self.wait.take()?;
        warn!(%error, "Stop wait failed");
        Some(StopUpdate::failed(StopFailure::Geolocation(error)))
    }

    /// Fail the wait once the overall timeout has elapsed
    pub fn poll_timeout(&mut self, now_ms: u64) -> Option<StopUpdate> {
        let started_ms = self.wait.as_ref()?.started_ms;
        if now_ms.saturating_sub(started_ms) < self.config.timeout_ms {
            return None;
        }
        self.wait = None;
        warn!(started_ms, now_ms, "Stop wait timed out");
        Some(StopUpdate::failed(StopFailure::TimedOut))
    }

    /// Abandon the wait without an outcome
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.wait.take().is_some();
        if cancelled {
            debug!("Stop wait cancelled");
        }
        cancelled
    }
}

impl Default for StopDetector {
    fn default() -> Self {
        Self::new(StopConfig::default())
    }
}
