//! Cloud Synchronization Module
//!
//! Outbound incident notification:
//! - JSON incident message built from engine reports
//! - HTTP delivery with a bounded timeout
//! - Failures swallowed and reported as a simulated send

mod message;
mod notifier;

pub use message::{IncidentMessage, DEFAULT_USER_NAME};
pub use notifier::{AlertNotifier, NotifierConfig, NotifyOutcome, DEFAULT_ENDPOINT};

use thiserror::Error;

/// Notification error types
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server rejected alert: HTTP {0}")]
    Status(u16),
}
