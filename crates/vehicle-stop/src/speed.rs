//! Ground speed resolution
//!
//! Native device speed wins when it is plausible. Otherwise speed is derived
//! from the distance to the previous fix, provided the two fixes are neither
//! too close nor too far apart in time.

use tracing::trace;

use crate::geo::{haversine_m, GeoFix};
use crate::StopConfig;

#[derive(Debug, Clone, Copy)]
struct PreviousFix {
    lat: f64,
    lon: f64,
    timestamp_ms: u64,
}

/// Speed estimator over successive fixes
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    native_ceiling_mps: f64,
    min_dt_ms: u64,
    max_dt_ms: u64,
    previous: Option<PreviousFix>,
}

impl SpeedEstimator {
    pub fn new(config: &StopConfig) -> Self {
        Self {
            native_ceiling_mps: config.native_speed_ceiling_mps,
            min_dt_ms: config.min_speed_interval_ms,
            max_dt_ms: config.max_speed_interval_ms,
            previous: None,
        }
    }

    /// Resolve the speed for this fix (m/s), `None` when undeterminable.
    /// Every fix with coordinates becomes the next previous sample.
    pub fn estimate(&mut self, fix: &GeoFix) -> Option<f64> {
        let native = fix
            .speed_mps
            .filter(|v| v.is_finite() && *v >= 0.0 && *v < self.native_ceiling_mps);

        let speed = native.or_else(|| self.derived(fix));

        if fix.has_coordinates() {
            self.previous = Some(PreviousFix {
                lat: fix.lat,
                lon: fix.lon,
                timestamp_ms: fix.timestamp_ms,
            });
        }
        speed
    }

    fn derived(&self, fix: &GeoFix) -> Option<f64> {
        let prev = self.previous?;
        if !fix.has_coordinates() {
            return None;
        }
        let dt_ms = fix.timestamp_ms.checked_sub(prev.timestamp_ms)?;
        if dt_ms <= self.min_dt_ms || dt_ms >= self.max_dt_ms {
            trace!(dt_ms, "Fix interval outside derived-speed window");
            return None;
        }
        let distance = haversine_m(prev.lat, prev.lon, fix.lat, fix.lon);
        let speed = distance / (dt_ms as f64 / 1000.0);
        speed.is_finite().then_some(speed)
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> SpeedEstimator {
        SpeedEstimator::new(&StopConfig::default())
    }

    #[test]
    fn test_native_speed_preferred() {
        let mut est = estimator();
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 0).with_speed(4.2)), Some(4.2));
    }

    #[test]
    fn test_implausible_native_speed_ignored() {
        let mut est = estimator();
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 0).with_speed(150.0)), None);
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 100).with_speed(-1.0)), None);
    }

    #[test]
    fn test_derived_speed_from_distance() {
        let mut est = estimator();
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 0)), None);
        // ~111 m north in 10 s
        let speed = est.estimate(&GeoFix::new(0.001, 0.0, 10_000)).unwrap();
        assert!((speed - 11.12).abs() < 0.01);
    }

    #[test]
    fn test_derived_speed_window() {
        let mut est = estimator();
        est.estimate(&GeoFix::new(0.0, 0.0, 0));
        // Too close in time
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 300)), None);
        // Too far apart
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 30_300)), None);
        assert_eq!(est.estimate(&GeoFix::new(0.0, 0.0, 31_300)), Some(0.0));
    }

    #[test]
    fn test_native_fix_still_becomes_previous() {
        let mut est = estimator();
        est.estimate(&GeoFix::new(0.0, 0.0, 0).with_speed(1.0));
        assert!(est.estimate(&GeoFix::new(0.0, 0.0, 2_000)).is_some());
    }
}
