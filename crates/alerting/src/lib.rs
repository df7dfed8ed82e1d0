//! Alerting System
//!
//! Drowsiness alert playback: idempotent start, duration cap, escalation.

mod manager;

pub use manager::{AlertCommand, AlertConfig, AlertManager, AlertState};
