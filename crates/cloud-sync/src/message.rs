//! Incident message body

use chrono::{DateTime, Utc};
use safety_gate::IncidentReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vehicle_stop::{GeoFix, UNKNOWN_ACCURACY_M};

pub const DEFAULT_USER_NAME: &str = "Driver";

/// JSON body POSTed to the alert endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentMessage {
    pub user_name: String,
    pub incident_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Accuracy radius (meters), 9999 when unknown
    pub accuracy: f64,
    pub speed_mps: Option<f64>,
    /// Wall-clock time of the incident (epoch ms)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
    pub reason: String,
}

impl IncidentMessage {
    /// Build a message with a fresh incident id
    pub fn new(
        user_name: impl Into<String>,
        reason: impl Into<String>,
        position: Option<&GeoFix>,
        when: DateTime<Utc>,
    ) -> Self {
        let (lat, lon, accuracy, speed_mps) = match position {
            Some(fix) if fix.has_coordinates() => {
                (fix.lat, fix.lon, fix.accuracy_or_unknown(), fix.speed_mps)
            }
            _ => (0.0, 0.0, UNKNOWN_ACCURACY_M, None),
        };

        Self {
            user_name: user_name.into(),
            incident_id: Uuid::new_v4().to_string(),
            lat,
            lon,
            accuracy,
            speed_mps,
            when,
            reason: reason.into(),
        }
    }

    /// Message for an engine incident report, stamped now
    pub fn from_report(report: &IncidentReport, user_name: &str) -> Self {
        Self::new(
            user_name,
            report.reason.as_str(),
            report.position.as_ref(),
            Utc::now(),
        )
    }
}
