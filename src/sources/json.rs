//! Backend JSON track response integration

use std::io::Read;

use log::{debug, warn};
use serde_json::{Map, Value};
use time::PrimitiveDateTime;

use super::{parse_flag, parse_timestamp, DevicePoint, FieldsConfiguration, PointsSource};
use crate::error::Result;
use crate::TrackPoint;

/// JSON track source, one device per document
///
/// Reads either the backend response envelope, `{"res":[{"f":[...]}]}`,
/// or a bare array of rows.
pub struct JsonSource<T>
where
    T: Read,
{
    reader: T,
    device_id: String,
    fields: FieldsConfiguration,
}

impl<T> JsonSource<T>
where
    T: Read,
{
    pub fn new(reader: T, device_id: String, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            reader,
            device_id,
            fields: fields.unwrap_or_default(),
        }
    }
}

impl<T> PointsSource for JsonSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<DevicePoint>> {
        let doc: Value = serde_json::from_reader(&mut self.reader)?;

        let rows = match rows(&doc) {
            Some(rows) => rows,
            None => {
                warn!("Track response has no points");
                return Ok(vec![]);
            }
        };

        let mut points = vec![];
        for row in rows {
            let point = match row.as_object().and_then(|r| parse_row(&self.fields, r)) {
                Some(point) => point,
                None => {
                    warn!("Skipping malformed track point: {}", row);
                    continue;
                }
            };

            if start <= point.timestamp && point.timestamp <= end {
                points.push(DevicePoint {
                    device_id: self.device_id.clone(),
                    point,
                });
            }
        }

        debug!(
            "{} of {} track points kept for {}",
            points.len(),
            rows.len(),
            self.device_id
        );

        Ok(points)
    }
}

fn rows(doc: &Value) -> Option<&Vec<Value>> {
    match doc {
        Value::Array(rows) => Some(rows),
        Value::Object(_) => doc
            .get("res")?
            .as_array()?
            .first()?
            .get("f")?
            .as_array(),
        _ => None,
    }
}

/// Numbers may come quoted
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whole numbers only, fractional or out of range values are dropped
fn integer(value: &Value) -> Option<i32> {
    let n = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    i32::try_from(n).ok()
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_flag(s),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// `None` unless coordinates and time are present and valid
fn parse_row(fields: &FieldsConfiguration, row: &Map<String, Value>) -> Option<TrackPoint> {
    let latitude = row.get(&fields.latitude).and_then(number)?;
    let longitude = row.get(&fields.longitude).and_then(number)?;
    let timestamp = row
        .get(&fields.time)
        .and_then(Value::as_str)
        .and_then(|t| parse_timestamp(t).ok())?;
    let speed = row.get(&fields.speed).and_then(number).unwrap_or(0.0);

    let mut point = TrackPoint::basic(latitude, longitude, timestamp, speed);
    point.satellites = row.get(&fields.satellites).and_then(integer);
    point.voltage = row.get(&fields.voltage).and_then(integer);
    point.altitude = row.get(&fields.altitude).and_then(number);
    point.ignition = row.get(&fields.ignition).and_then(flag);
    point.moving = row.get(&fields.moving).and_then(flag);

    Some(point)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::JsonSource;
    use crate::error::Result;
    use crate::sources::SourceToDevices;

    #[test]
    fn backend_envelope() -> Result<()> {
        let data = r#"{"name":"Device Track","res":[{"f":[
            {"latitude":50.45,"longitude":30.52,"wdate":"12.01.26T15:30:46","speed":42.0,
             "satelites":9,"ignition":true,"ismoves":true,"batvoltage":13,"altitude":170.0},
            {"latitude":"50.46","longitude":"30.53","wdate":"12.01.26T15:31:46"},
            {"latitude":50.47,"wdate":"12.01.26T15:32:46"},
            {"latitude":50.47,"longitude":30.54,"wdate":"yesterday"}
        ]}]}"#;

        let source = JsonSource::new(data.as_bytes(), "353173".to_string(), None);
        let devices = SourceToDevices::build(
            source,
            datetime!(2026-01-12 0:00),
            datetime!(2026-01-13 0:00),
        )?;

        let track = &devices["353173"];
        assert_eq!(2, track.len());

        let p = &track[0];
        assert_eq!(datetime!(2026-01-12 15:30:46), p.timestamp);
        assert_eq!(42.0, p.speed);
        assert_eq!(Some(9), p.satellites);
        assert_eq!(Some(true), p.ignition);
        assert_eq!(Some(true), p.moving);
        assert_eq!(Some(13), p.voltage);
        assert_eq!(Some(170.0), p.altitude);

        let p = &track[1];
        assert_eq!(50.46, p.latitude);
        assert_eq!(0.0, p.speed);
        assert_eq!(None, p.satellites);
        assert_eq!(None, p.ignition);

        Ok(())
    }

    #[test]
    fn fractional_counts_are_dropped() -> Result<()> {
        let data = r#"[
            {"latitude":50.45,"longitude":30.52,"wdate":"2026-01-13T14:47:15",
             "satelites":7.5,"batvoltage":11.9},
            {"latitude":50.45,"longitude":30.52,"wdate":"2026-01-13T14:48:15",
             "satelites":"12","batvoltage":3000000000}
        ]"#;

        let source = JsonSource::new(data.as_bytes(), "car".to_string(), None);
        let devices = SourceToDevices::build(
            source,
            datetime!(2026-01-13 0:00),
            datetime!(2026-01-13 23:59:59),
        )?;

        let track = &devices["car"];
        assert_eq!(None, track[0].satellites);
        assert_eq!(None, track[0].voltage);
        assert_eq!(Some(12), track[1].satellites);
        assert_eq!(None, track[1].voltage);

        Ok(())
    }

    #[test]
    fn bare_rows_and_window() -> Result<()> {
        let data = r#"[
            {"latitude":50.45,"longitude":30.52,"wdate":"2026-01-13T14:47:15","speed":10},
            {"latitude":50.45,"longitude":30.52,"wdate":"2026-01-14 14:47:15","speed":10}
        ]"#;

        let source = JsonSource::new(data.as_bytes(), "car".to_string(), None);
        let devices = SourceToDevices::build(
            source,
            datetime!(2026-01-13 0:00),
            datetime!(2026-01-13 23:59:59),
        )?;
        assert_eq!(1, devices["car"].len());

        Ok(())
    }

    #[test]
    fn empty_response() -> Result<()> {
        let source = JsonSource::new(r#"{"res":[]}"#.as_bytes(), "car".to_string(), None);
        let devices = SourceToDevices::build(
            source,
            datetime!(2026-01-13 0:00),
            datetime!(2026-01-13 23:59:59),
        )?;
        assert!(devices.is_empty());

        Ok(())
    }

    #[test]
    fn invalid_document() {
        let source = JsonSource::new("{not json".as_bytes(), "car".to_string(), None);
        let result = SourceToDevices::build(
            source,
            datetime!(2026-01-13 0:00),
            datetime!(2026-01-13 23:59:59),
        );
        assert!(result.is_err());
    }
}
