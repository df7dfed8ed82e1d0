//! Alert Manager Implementation

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Playback cap for early drowsy events (default: 3s)
    pub base_duration_ms: u64,
    /// Playback cap once the driver keeps getting drowsy (default: 10s)
    pub escalated_duration_ms: u64,
    /// Drowsy-event count above which the escalated cap applies
    pub escalate_after_events: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            base_duration_ms: 3_000,
            escalated_duration_ms: 10_000,
            escalate_after_events: 3,
        }
    }
}

impl AlertConfig {
    /// Playback cap for the given drowsy-event count
    pub fn duration_for(&self, drowsy_events: u32) -> u64 {
        if drowsy_events > self.escalate_after_events {
            self.escalated_duration_ms
        } else {
            self.base_duration_ms
        }
    }
}

/// Instruction for the audio sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AlertCommand {
    Start { max_duration_ms: u64 },
    Stop,
}

/// State of the playing alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// When playback started
    pub started_ms: u64,
    /// Playback stops once this much time has passed
    pub max_duration_ms: u64,
}

impl AlertState {
    pub fn expires_at_ms(&self) -> u64 {
        self.started_ms.saturating_add(self.max_duration_ms)
    }
}

/// Alert playback policy: idempotent start, self-limiting duration
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Current playback, if any
    playing: Option<AlertState>,
    /// Number of playbacks started
    fire_count: usize,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            playing: None,
            fire_count: 0,
        }
    }

    pub fn set_config(&mut self, config: AlertConfig) {
        self.config = config;
    }

    /// Start playback unless an alert is already playing
    pub fn start(&mut self, now_ms: u64, drowsy_events: u32) -> Option<AlertCommand> {
        if let Some(state) = &self.playing {
            debug!(started_ms = state.started_ms, "Alert already playing");
            return None;
        }

        let max_duration_ms = self.config.duration_for(drowsy_events);
        self.playing = Some(AlertState {
            started_ms: now_ms,
            max_duration_ms,
        });
        self.fire_count += 1;
        info!(
            max_duration_ms,
            drowsy_events,
            "Alert started (count: {})",
            self.fire_count
        );
        Some(AlertCommand::Start { max_duration_ms })
    }

    /// Stop playback once its cap has elapsed
    pub fn tick(&mut self, now_ms: u64) -> Option<AlertCommand> {
        let expired = self
            .playing
            .is_some_and(|state| now_ms >= state.expires_at_ms());
        if expired {
            debug!(now_ms, "Alert duration cap reached");
            self.stop()
        } else {
            None
        }
    }

    /// Stop playback immediately
    pub fn stop(&mut self) -> Option<AlertCommand> {
        self.playing.take().map(|state| {
            info!(started_ms = state.started_ms, "Alert stopped");
            AlertCommand::Stop
        })
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    pub fn playing(&self) -> Option<&AlertState> {
        self.playing.as_ref()
    }

    /// Get number of playbacks started
    pub fn fire_count(&self) -> usize {
        self.fire_count
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_idempotent() {
        let mut manager = AlertManager::default();

        assert_eq!(
            manager.start(0, 1),
            Some(AlertCommand::Start {
                max_duration_ms: 3_000
            })
        );
        // Second drowsy entry while playing is a no-op
        assert_eq!(manager.start(500, 2), None);
        assert_eq!(manager.fire_count(), 1);
    }

    #[test]
    fn test_escalation() {
        let config = AlertConfig::default();

        assert_eq!(config.duration_for(3), 3_000);
        assert_eq!(config.duration_for(4), 10_000);
    }

    #[test]
    fn test_duration_cap() {
        let mut manager = AlertManager::default();
        manager.start(1_000, 0);

        assert_eq!(manager.tick(3_999), None);
        assert_eq!(manager.tick(4_000), Some(AlertCommand::Stop));
        assert!(!manager.is_playing());
        assert_eq!(manager.tick(5_000), None);
    }

    #[test]
    fn test_stop() {
        let mut manager = AlertManager::default();
        assert_eq!(manager.stop(), None);

        manager.start(0, 5);
        assert_eq!(manager.playing().unwrap().max_duration_ms, 10_000);
        assert_eq!(manager.stop(), Some(AlertCommand::Stop));
        // Can start again after stopping
        assert!(manager.start(100, 5).is_some());
    }
}
