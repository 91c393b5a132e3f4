//! CSV file source integration

use std::io::Read;

use csv::{Reader, StringRecord};
use log::warn;
use time::PrimitiveDateTime;

use super::{parse_flag, parse_timestamp, DevicePoint, FieldsConfiguration, PointsSource};
use crate::error::{Error, Result};
use crate::TrackPoint;

/// CSV tracks source
///
/// Files without a device column are attributed to `default_device`.
pub struct CsvSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: FieldsConfiguration,
    default_device: String,
}

impl<T> CsvSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<FieldsConfiguration>, default_device: String) -> Self {
        Self {
            rdr,
            fields: fields.unwrap_or_default(),
            default_device,
        }
    }
}

impl<T> PointsSource for CsvSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<DevicePoint>> {
        let mut points = vec![];

        let mut header = self.rdr.headers()?.clone();
        let header_idx = parse_header(&self.fields, &mut header)?;

        for row in self.rdr.records() {
            let mut rec = row?;

            if let Some(dpoint) = parse_row(&header_idx, &self.default_device, &mut rec)? {
                if start <= dpoint.point.timestamp && dpoint.point.timestamp <= end {
                    points.push(dpoint);
                }
            }
        }

        Ok(points)
    }
}

/// Field to index map
#[derive(Debug)]
struct FieldsIndex {
    device: Option<usize>,
    latitude: usize,
    longitude: usize,
    time: usize,
    speed: Option<usize>,
    satellites: Option<usize>,
    ignition: Option<usize>,
    moving: Option<usize>,
    voltage: Option<usize>,
    altitude: Option<usize>,
}

fn parse_header(fields: &FieldsConfiguration, header: &mut StringRecord) -> Result<FieldsIndex> {
    header.trim();

    let find = |name: &str| {
        header
            .iter()
            .position(|h| h.to_lowercase() == name.to_lowercase())
    };
    let require = |name: &str| find(name).ok_or_else(|| Error::MissingHeader(name.to_string()));

    Ok(FieldsIndex {
        device: find(&fields.device_id),
        latitude: require(&fields.latitude)?,
        longitude: require(&fields.longitude)?,
        time: require(&fields.time)?,
        speed: find(&fields.speed),
        satellites: find(&fields.satellites),
        ignition: find(&fields.ignition),
        moving: find(&fields.moving),
        voltage: find(&fields.voltage),
        altitude: find(&fields.altitude),
    })
}

/// Non empty value of an optional column
fn cell(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).filter(|v| !v.is_empty())
}

fn number<N: std::str::FromStr>(field: &str, raw: &str) -> Result<N> {
    raw.parse::<N>().map_err(|_| Error::InvalidField {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// `None` for rows without coordinates
fn parse_row(
    header: &FieldsIndex,
    default_device: &str,
    row: &mut StringRecord,
) -> Result<Option<DevicePoint>> {
    row.trim();

    let (raw_lat, raw_lng) = match (cell(row, Some(header.latitude)), cell(row, Some(header.longitude))) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            warn!("Skipping track point without coordinates: {:?}", row);
            return Ok(None);
        }
    };
    let latitude = number::<f64>("latitude", raw_lat)?;
    let longitude = number::<f64>("longitude", raw_lng)?;

    let timestamp = match cell(row, Some(header.time)) {
        Some(d) => parse_timestamp(d),
        None => Err(Error::InvalidField {
            field: "time".to_string(),
            value: String::new(),
        }),
    }?;

    let speed = match cell(row, header.speed) {
        Some(s) => number::<f64>("speed", s)?,
        None => 0.0,
    };

    let mut point = TrackPoint::basic(latitude, longitude, timestamp, speed);
    point.satellites = cell(row, header.satellites).and_then(|s| s.parse().ok());
    point.voltage = cell(row, header.voltage).and_then(|s| s.parse().ok());
    point.altitude = cell(row, header.altitude).and_then(|s| s.parse().ok());
    point.ignition = cell(row, header.ignition).and_then(parse_flag);
    point.moving = cell(row, header.moving).and_then(parse_flag);

    let device_id = cell(row, header.device).unwrap_or(default_device).to_string();

    Ok(Some(DevicePoint { device_id, point }))
}

#[cfg(test)]
pub mod tests {
    use csv::ReaderBuilder;
    use time::macros::datetime;

    use super::CsvSource;
    use crate::error::Result;
    use crate::sources::{FieldsConfiguration, SourceToDevices};

    #[test]
    fn track() -> Result<()> {
        let data = "device,latitude,longitude,wdate\n\
            AA251,50.4501,30.5234,2024-10-01T00:01:00\n\
            AA251,50.4511,30.5234,2024-10-01T00:02:00\n\
            BB007,49.8397,24.0297,01.10.24 00:03:00\n";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let source = CsvSource::new(rdr, None, "unknown".to_string());

        let devices = SourceToDevices::build(
            source,
            datetime!(2024-01-01 0:00),
            datetime!(2024-12-31 0:00),
        )?;
        assert_eq!(2, devices.len());

        let track = &devices["AA251"];
        assert_eq!(2, track.len());
        assert_eq!(50.4501, track[0].latitude);
        assert_eq!(30.5234, track[0].longitude);
        assert_eq!(datetime!(2024-10-01 0:01), track[0].timestamp);
        assert_eq!(0.0, track[0].speed);
        assert_eq!(None, track[0].satellites);

        assert_eq!(datetime!(2024-10-01 0:03), devices["BB007"][0].timestamp);

        Ok(())
    }

    #[test]
    fn track_filter() -> Result<()> {
        let data = "device,latitude,longitude,wdate\n\
            AA251,50.45,30.52,2024-10-01T00:01:00\n\
            AA251,50.46,30.52,2024-10-02T00:02:00\n\
            AA251,50.47,30.52,2024-10-03T00:03:00\n";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let source = CsvSource::new(rdr, None, "unknown".to_string());

        let devices = SourceToDevices::build(
            source,
            datetime!(2024-10-01 0:00),
            datetime!(2024-10-02 0:02),
        )?;
        assert_eq!(2, devices["AA251"].len());

        Ok(())
    }

    #[test]
    fn rows_without_coordinates_are_skipped() -> Result<()> {
        let data = "device,latitude,longitude,wdate\n\
            AA251,50.45,30.52,2024-10-01T00:01:00\n\
            AA251,,,2024-10-01T00:02:00\n\
            AA251, , ,2024-10-01T00:03:00\n";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let source = CsvSource::new(rdr, None, "unknown".to_string());

        let devices = SourceToDevices::build(
            source,
            datetime!(2024-01-01 0:00),
            datetime!(2024-12-31 0:00),
        )?;
        assert_eq!(1, devices["AA251"].len());

        Ok(())
    }

    #[test]
    fn telemetry_fields() -> Result<()> {
        let data = "lat,lon,time,speed,sats,ign,moves,volts,alt\n\
            50.45,30.52,2024-10-01 00:01:00,12.5,5,false,1,11,180.5\n\
            50.45,30.52,2024-10-01 00:02:00,0,,,,,\n";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let fields = FieldsConfiguration {
            latitude: "lat".to_string(),
            longitude: "lon".to_string(),
            time: "time".to_string(),
            satellites: "sats".to_string(),
            ignition: "ign".to_string(),
            moving: "moves".to_string(),
            voltage: "volts".to_string(),
            altitude: "alt".to_string(),
            ..Default::default()
        };
        let source = CsvSource::new(rdr, Some(fields), "truck-1".to_string());

        let devices = SourceToDevices::build(
            source,
            datetime!(2024-01-01 0:00),
            datetime!(2024-12-31 0:00),
        )?;
        let track = &devices["truck-1"];
        assert_eq!(2, track.len());

        let p = &track[0];
        assert_eq!(12.5, p.speed);
        assert_eq!(Some(5), p.satellites);
        assert_eq!(Some(false), p.ignition);
        assert_eq!(Some(true), p.moving);
        assert_eq!(Some(11), p.voltage);
        assert_eq!(Some(180.5), p.altitude);

        let p = &track[1];
        assert_eq!(None, p.satellites);
        assert_eq!(None, p.ignition);
        assert_eq!(None, p.altitude);

        Ok(())
    }

    #[test]
    fn missing_required_header() {
        let data = "device,latitude,wdate\nAA251,50.45,2024-10-01T00:01:00\n";
        let rdr = ReaderBuilder::new().from_reader(data.as_bytes());

        let source = CsvSource::new(rdr, None, "unknown".to_string());
        let err = SourceToDevices::build(
            source,
            datetime!(2024-01-01 0:00),
            datetime!(2024-12-31 0:00),
        )
        .unwrap_err();
        assert_eq!("longitude header not found", err.to_string());
    }

    #[test]
    fn invalid_number() {
        let data = "device,latitude,longitude,wdate\nAA251,north,30.52,2024-10-01T00:01:00\n";
        let rdr = ReaderBuilder::new().from_reader(data.as_bytes());

        let source = CsvSource::new(rdr, None, "unknown".to_string());
        let result = SourceToDevices::build(
            source,
            datetime!(2024-01-01 0:00),
            datetime!(2024-12-31 0:00),
        );
        assert!(result.is_err());
    }
}
