//! Geolocation samples and great-circle distance

use serde::{Deserialize, Serialize};

/// Mean Earth radius (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Accuracy assumed when a fix does not report one (meters)
pub const UNKNOWN_ACCURACY_M: f64 = 9_999.0;

/// One position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    /// Latitude (degrees)
    pub lat: f64,
    /// Longitude (degrees)
    pub lon: f64,
    /// When the fix was taken, same clock as the caller's `now_ms`
    pub timestamp_ms: u64,
    /// Horizontal accuracy radius (meters)
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Ground speed reported by the device (m/s)
    #[serde(default)]
    pub speed_mps: Option<f64>,
}

impl GeoFix {
    pub fn new(lat: f64, lon: f64, timestamp_ms: u64) -> Self {
        Self {
            lat,
            lon,
            timestamp_ms,
            accuracy_m: None,
            speed_mps: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Reported accuracy, or a very poor value when absent
    pub fn accuracy_or_unknown(&self) -> f64 {
        self.accuracy_m.unwrap_or(UNKNOWN_ACCURACY_M)
    }

    pub fn has_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Haversine distance between two coordinates (meters)
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_m(48.1, 11.5, 48.1, 11.5), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.19 km on this sphere
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0);
    }

    #[test]
    fn test_fix_from_json_without_optionals() {
        let fix: GeoFix =
            serde_json::from_str(r#"{ "lat": 52.5, "lon": 13.4, "timestamp_ms": 1000 }"#).unwrap();
        assert_eq!(fix.accuracy_or_unknown(), UNKNOWN_ACCURACY_M);
        assert_eq!(fix.speed_mps, None);
    }
}
