//! JSON-lines scenario files
//!
//! One event per line, externally tagged:
//!
//! ```text
//! {"frame": {"timestamp_ms": 0, "faces": [{"33": {"x": 0.42, "y": 0.4}, ...}]}}
//! {"position": {"lat": 48.1, "lon": 11.5, "timestamp_ms": 2000, "accuracy_m": 8.0, "speed_mps": 0.0}}
//! {"position_error": {"timestamp_ms": 2500, "error": "permission_denied"}}
//! {"input": {"timestamp_ms": 9000, "action": "press_pad", "pad": 2}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use dms::FrameInput;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};
use vehicle_stop::{GeoError, GeoFix};

use crate::host::HostEvent;

/// Driver interaction with the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    StartChallenge,
    PressPad {
        pad: u8,
    },
    ExitChallenge,
    ProceedManually,
    SendTestAlert,
    SelectFace {
        #[serde(default)]
        index: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub action: UserAction,
}

/// Output of the position source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEvent {
    Fix(GeoFix),
    Error { timestamp_ms: u64, error: GeoError },
}

impl PositionEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            PositionEvent::Fix(fix) => fix.timestamp_ms,
            PositionEvent::Error { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}

/// One recorded line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioEvent {
    Frame(FrameInput),
    Position(GeoFix),
    PositionError { timestamp_ms: u64, error: GeoError },
    Input(UserInput),
}

impl ScenarioEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            ScenarioEvent::Frame(frame) => frame.timestamp_ms,
            ScenarioEvent::Position(fix) => fix.timestamp_ms,
            ScenarioEvent::PositionError { timestamp_ms, .. } => *timestamp_ms,
            ScenarioEvent::Input(input) => input.timestamp_ms,
        }
    }
}

/// Parse scenario text
pub fn parse_scenario(text: &str) -> Result<Vec<ScenarioEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid scenario event on line {}", number + 1))
        })
        .collect()
}

pub fn load_scenario(path: &Path) -> Result<Vec<ScenarioEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let events = parse_scenario(&text)?;
    info!("Loaded {} scenario events from {}", events.len(), path.display());
    Ok(events)
}

impl From<ScenarioEvent> for HostEvent {
    fn from(event: ScenarioEvent) -> Self {
        match event {
            ScenarioEvent::Frame(frame) => HostEvent::Frame(frame),
            ScenarioEvent::Position(fix) => HostEvent::Position(PositionEvent::Fix(fix)),
            ScenarioEvent::PositionError {
                timestamp_ms,
                error,
            } => HostEvent::Position(PositionEvent::Error {
                timestamp_ms,
                error,
            }),
            ScenarioEvent::Input(input) => HostEvent::Input(input),
        }
    }
}

/// Push events into the host stream in file order. With `realtime` each
/// event waits for its offset from the first timestamp. Dropping the sink on
/// return closes the stream.
pub async fn replay(
    events: Vec<ScenarioEvent>,
    sink: mpsc::Sender<HostEvent>,
    realtime: bool,
) -> Result<usize> {
    let origin_ms = events.first().map(ScenarioEvent::timestamp_ms).unwrap_or(0);
    let start = Instant::now();
    let mut sent = 0;

    for event in events {
        if realtime {
            let offset = event.timestamp_ms().saturating_sub(origin_ms);
            tokio::time::sleep_until(start + Duration::from_millis(offset)).await;
        }
        sink.send(event.into()).await.context("Host stream closed")?;
        sent += 1;
    }

    debug!(sent, "Scenario replay finished");
    Ok(sent)
}
