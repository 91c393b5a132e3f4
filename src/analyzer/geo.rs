//! Geospatial helpers shared by every analyzer

use serde::{Deserialize, Serialize};
use time::Duration;

use super::point::TrackPoint;

/// Earth radius used by the haversine formula, meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two coordinates in degrees
///
/// NaN coordinates propagate to a NaN distance.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance between two track points, meters
pub fn distance_between(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    haversine_distance(p1.latitude, p1.longitude, p2.latitude, p2.longitude)
}

/// Time elapsed from `p1` to `p2`, negative when `p2` is older
pub fn elapsed(p1: &TrackPoint, p2: &TrackPoint) -> Duration {
    p2.timestamp - p1.timestamp
}

/// Speed derived from the covered distance and the elapsed time, km/h
///
/// Returns `None` when the elapsed time is zero or negative.
pub fn calculated_speed_kph(p1: &TrackPoint, p2: &TrackPoint) -> Option<f64> {
    let elapsed_ms = elapsed(p1, p2).whole_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }

    let hours = elapsed_ms as f64 / 3_600_000.0;
    Some(distance_between(p1, p2) / 1000.0 / hours)
}

/// Inclusive latitude/longitude box, degrees
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Service area of the fleet: Ukraine
    pub const UKRAINE: GeoBounds = GeoBounds {
        min_lat: 44.3,
        max_lat: 52.4,
        min_lon: 22.1,
        max_lon: 40.2,
    };

    pub fn is_outside(&self, latitude: f64, longitude: f64) -> bool {
        latitude < self.min_lat
            || latitude > self.max_lat
            || longitude < self.min_lon
            || longitude > self.max_lon
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::UKRAINE
    }
}
