//! Vehicle Stop Detection
//!
//! Decides from a stream of geolocation fixes whether the vehicle has been
//! at rest long enough to start the attention challenge.

mod detector;
mod error;
mod geo;
mod speed;

pub use detector::{
    StopConfig, StopDetector, StopFailure, StopOutcome, StopUpdate, PARK_PROMPT,
};
pub use error::GeoError;
pub use geo::{haversine_m, GeoFix, EARTH_RADIUS_M, UNKNOWN_ACCURACY_M};
pub use speed::SpeedEstimator;
