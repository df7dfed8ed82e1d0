//! Geolocation Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the position source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoError {
    /// The host has no geolocation capability
    #[error("Geolocation not available")]
    Unsupported,

    /// The user refused location access
    #[error("Location permission denied")]
    PermissionDenied,

    /// The device could not determine a position
    #[error("Position unavailable")]
    PositionUnavailable,

    /// A single position request timed out
    #[error("Position request timed out")]
    Timeout,
}
