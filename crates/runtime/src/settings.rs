//! Layered settings: defaults, optional TOML file, `WRAITH__*` environment

use std::path::Path;

use anyhow::{Context, Result};
use cloud_sync::NotifierConfig;
use config::{Config, Environment, File, FileFormat};
use safety_gate::EngineConfig;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "WRAITH";

/// Host loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Timer tick period (default: 100ms)
    pub tick_interval_ms: u64,
    /// Whether the host can provide position fixes at all
    pub geolocation_available: bool,
    /// Replay the scenario at its recorded pace instead of as fast as possible
    pub realtime: bool,
    /// Fixed challenge seed for reproducible runs
    pub seed: Option<u64>,
    /// Send incident notifications over HTTP
    pub notify: bool,
    /// Channel capacity for each input stream
    pub channel_capacity: usize,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            geolocation_available: true,
            realtime: false,
            seed: None,
            notify: true,
            channel_capacity: 256,
            json_logs: false,
        }
    }
}

/// Complete settings tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub notifier: NotifierConfig,
    pub runtime: RuntimeSettings,
}

impl Settings {
    /// Load from an optional TOML file and the `WRAITH__*` environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = Config::builder().add_source(defaults()?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        build(builder.add_source(environment(prefix)))
    }

    /// Load from TOML text layered over defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        build(
            Config::builder()
                .add_source(defaults()?)
                .add_source(File::from_str(text, FileFormat::Toml)),
        )
    }
}

fn defaults() -> Result<Config> {
    Config::try_from(&Settings::default()).context("Failed to encode default settings")
}

fn environment(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Settings> {
    builder
        .build()
        .context("Failed to read settings")?
        .try_deserialize()
        .context("Invalid settings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.engine.drowsy_event_threshold, 5);
        assert_eq!(settings.notifier.endpoint, "http://localhost:8787/api/alert");
    }

    #[test]
    fn test_toml_overrides() {
        let settings = Settings::from_toml(
            r#"
            [engine]
            drowsy_event_threshold = 3

            [engine.dms]
            ear_threshold = 0.2

            [engine.stop]
            hold_ms = 3000

            [runtime]
            seed = 7
            notify = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.engine.drowsy_event_threshold, 3);
        assert!((settings.engine.dms.ear_threshold - 0.2).abs() < 1e-6);
        assert_eq!(settings.engine.stop.hold_ms, 3_000);
        // Untouched values keep their defaults
        assert_eq!(settings.engine.dms.drowsiness_threshold_ms, 1_500);
        assert_eq!(settings.runtime.seed, Some(7));
        assert!(!settings.runtime.notify);
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("WRAITHTEST__ENGINE__DROWSY_EVENT_THRESHOLD", "8");
        std::env::set_var("WRAITHTEST__RUNTIME__GEOLOCATION_AVAILABLE", "false");

        let settings = Settings::load_with_prefix(None, "WRAITHTEST").unwrap();
        assert_eq!(settings.engine.drowsy_event_threshold, 8);
        assert!(!settings.runtime.geolocation_available);

        std::env::remove_var("WRAITHTEST__ENGINE__DROWSY_EVENT_THRESHOLD");
        std::env::remove_var("WRAITHTEST__RUNTIME__GEOLOCATION_AVAILABLE");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("wraith-settings-does-not-exist.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_bad_value_is_an_error() {
        let result = Settings::from_toml("[engine]\ndrowsy_event_threshold = \"many\"");
        assert!(result.is_err());
    }
}
