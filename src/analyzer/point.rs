//! Track point definition

use geo::geometry::Point;
use serde::Serialize;
use time::PrimitiveDateTime;

/// One GPS sample reported by a tracked device
///
/// Timestamps are naive local times, exactly as delivered by the feed.
/// The optional telemetry is only reported by the raw device feeds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: PrimitiveDateTime,
    /// Device reported speed, km/h
    pub speed: f64,
    pub satellites: Option<i32>,
    pub ignition: Option<bool>,
    /// Movement sensor state
    pub moving: Option<bool>,
    /// Battery voltage, whole volts
    pub voltage: Option<i32>,
    /// Altitude in meters
    pub altitude: Option<f64>,
}

impl TrackPoint {
    pub fn basic(latitude: f64, longitude: f64, timestamp: PrimitiveDateTime, speed: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            speed,
            satellites: None,
            ignition: None,
            moving: None,
            voltage: None,
            altitude: None,
        }
    }

    /// Position as a geo point, x = longitude
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}
