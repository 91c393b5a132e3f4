//! Track point sources API

use std::collections::BTreeMap;

use serde::Deserialize;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::error::{Error, Result};
use crate::TrackPoint;

/// Track point source
pub trait PointsSource {
    /// Fetch the points recorded during the period, bounds included
    fn fetch(&mut self, start: PrimitiveDateTime, end: PrimitiveDateTime)
        -> Result<Vec<DevicePoint>>;
}

/// Track point tagged with the device that recorded it
#[derive(Clone, Debug, PartialEq)]
pub struct DevicePoint {
    pub device_id: String,
    pub point: TrackPoint,
}

/// Names of the fields holding each value in the feeds
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldsConfiguration {
    pub device_id: String,
    pub latitude: String,
    pub longitude: String,
    pub time: String,
    pub speed: String,
    pub satellites: String,
    pub ignition: String,
    pub moving: String,
    pub voltage: String,
    pub altitude: String,
}

impl Default for FieldsConfiguration {
    fn default() -> Self {
        Self {
            device_id: "device".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            time: "wdate".to_string(),
            speed: "speed".to_string(),
            satellites: "satelites".to_string(),
            ignition: "ignition".to_string(),
            moving: "ismoves".to_string(),
            voltage: "batvoltage".to_string(),
            altitude: "altitude".to_string(),
        }
    }
}

/// Fetch a source and split its points by device
pub struct SourceToDevices {}

impl SourceToDevices {
    pub fn build<SU>(
        mut source: SU,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<BTreeMap<String, Vec<TrackPoint>>>
    where
        SU: PointsSource,
    {
        let mut devices: BTreeMap<String, Vec<TrackPoint>> = BTreeMap::new();

        for dpoint in source.fetch(start, end)? {
            devices
                .entry(dpoint.device_id)
                .or_default()
                .push(dpoint.point);
        }

        Ok(devices)
    }
}

/// Parse the naive local timestamps sent by the tracking backend
///
/// Accepted: `2024-01-15T10:30:00`, `2024-01-15 10:30:00` (both with
/// optional fractional seconds), `15.01.24T10:30:00`, `15.01.24 10:30:00`,
/// `15.01.2024T10:30:00` and `15.01.2024 10:30:00`. Two digit years are
/// in the 2000s.
pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime> {
    let format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]");

    let failed = |reason: &str| Error::Timestamp {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    let (date, clock) = trimmed
        .split_once(|c: char| c == 'T' || c == ' ')
        .ok_or_else(|| failed("no time of day"))?;

    let date = if date.contains('-') {
        date.to_string()
    } else {
        let parts: Vec<&str> = date.split('.').collect();
        match parts.as_slice() {
            [day, month, year] if year.len() == 2 => format!("20{}-{}-{}", year, month, day),
            [day, month, year] if year.len() == 4 => format!("{}-{}-{}", year, month, day),
            _ => return Err(failed("unknown date format")),
        }
    };

    PrimitiveDateTime::parse(&format!("{} {}", date, clock.trim()), format)
        .map_err(|e| failed(&e.to_string()))
}

/// Parse a boolean flag: true/false, 1/0 or yes/no
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "csv")]
mod csv_file;

#[cfg(feature = "csv")]
pub use csv_file::CsvSource;

#[cfg(feature = "json")]
mod json;

#[cfg(feature = "json")]
pub use json::JsonSource;
