//! GPX export of analyzed tracks

use gpx::{Gpx, GpxVersion, Track, TrackSegment as GpxSegment, Waypoint};

use crate::{GroupedAnomaly, TrackPoint, TrackSegment};

pub struct GpxGenerator {
    pub tracks: Vec<Track>,
    pub waypoints: Vec<Waypoint>,
}

impl GpxGenerator {
    pub fn empty() -> Self {
        Self {
            tracks: vec![],
            waypoints: vec![],
        }
    }

    pub fn generate(self) -> Gpx {
        let mut gpx: Gpx = Default::default();
        gpx.version = GpxVersion::Gpx11;
        gpx.creator = Some("trackaudit".to_string());
        gpx.tracks = self.tracks;
        gpx.waypoints = self.waypoints;

        gpx
    }
}

/// Converts the analysis of one device into GPX items
pub struct Tracker {
    /// Device name, number...
    pub device: String,
    /// Data source, eg.: raw device track
    pub source: Option<String>,
}

impl Tracker {
    pub fn new(device: String) -> Self {
        Self {
            device,
            source: None,
        }
    }

    pub fn source(&mut self, source: String) -> &mut Self {
        self.source = Some(source);

        self
    }

    /// One GPX track per issue segment
    pub fn tracks(&self, segments: &[TrackSegment]) -> Vec<Track> {
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let mut track = Track::new();
                track.name = Some(format!("#{} {}", i + 1, segment.primary_issue()));
                track.description = Some(format!(
                    "{} | {} | {} points | tracked by `{}`",
                    segment.issues_label(),
                    segment.formatted_duration(),
                    segment.count(),
                    self.device
                ));
                track.source = self.source.clone();

                let mut tseg = GpxSegment::new();
                tseg.points = segment.points.iter().map(waypoint).collect();
                track.segments.push(tseg);

                track
            })
            .collect()
    }

    /// One GPX waypoint per anomaly group, at its first point
    pub fn waypoints(&self, groups: &[GroupedAnomaly]) -> Vec<Waypoint> {
        groups
            .iter()
            .map(|group| {
                let mut wp = waypoint(group.start_point());
                wp.name = Some(group.kind.to_string());
                wp.description = Some(group.group_description());
                wp.source = self.source.clone();
                wp
            })
            .collect()
    }
}

/// Naive timestamps are written as UTC
fn waypoint(point: &TrackPoint) -> Waypoint {
    let mut wp = Waypoint::new(point.point());

    wp.time = Some(point.timestamp.assume_utc().into());
    wp.elevation = point.altitude;
    wp.speed = Some(point.speed);
    wp.sat = point.satellites.and_then(|s| u64::try_from(s).ok());

    wp
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::{GpxGenerator, Tracker};
    use crate::{
        analyze_segments, detect_raw_track_anomalies, group_consecutive_anomalies, TrackPoint,
    };

    fn track() -> Vec<TrackPoint> {
        let t = datetime!(2024-05-24 8:00);
        vec![
            TrackPoint::basic(50.45, 30.52, t, 30.0),
            TrackPoint::basic(50.451, 30.52, t + Duration::minutes(1), 30.0),
            TrackPoint {
                satellites: Some(4),
                altitude: Some(180.0),
                ..TrackPoint::basic(50.452, 30.52, t + Duration::minutes(2), 30.0)
            },
            TrackPoint::basic(10.0, 10.0, t + Duration::minutes(3), 0.0),
        ]
    }

    #[test]
    fn segments_become_tracks() {
        let points = track();
        let segments = analyze_segments(&points);

        let mut tracker = Tracker::new("AA251".to_string());
        tracker.source("raw device track".to_string());
        let tracks = tracker.tracks(&segments);

        assert_eq!(segments.len(), tracks.len());
        assert_eq!(Some("#1 No issues".to_string()), tracks[0].name);
        assert_eq!(
            Some("No issues | 1 min | 2 points | tracked by `AA251`".to_string()),
            tracks[0].description
        );
        assert_eq!(Some("raw device track".to_string()), tracks[0].source);
        assert_eq!(Some("#2 Low satellites".to_string()), tracks[1].name);

        let wp = &tracks[1].segments[0].points[0];
        assert_eq!(points[2].point(), wp.point());
        assert_eq!(Some(180.0), wp.elevation);
        assert_eq!(Some(4), wp.sat);
        assert_eq!(Some(points[2].timestamp.assume_utc().into()), wp.time);
    }

    #[test]
    fn anomaly_groups_become_waypoints() {
        let points = track();
        let groups = group_consecutive_anomalies(detect_raw_track_anomalies(&points));

        let tracker = Tracker::new("AA251".to_string());
        let waypoints = tracker.waypoints(&groups);
        assert_eq!(groups.len(), waypoints.len());
        assert_eq!(Some("Speed spike".to_string()), waypoints[0].name);

        let abroad = &waypoints[waypoints.len() - 1];
        assert_eq!(Some("Out of bounds".to_string()), abroad.name);
        assert_eq!(points[3].point(), abroad.point());

        let mut gpx = GpxGenerator::empty();
        gpx.tracks = tracker.tracks(&analyze_segments(&points));
        gpx.waypoints = waypoints;

        let doc = gpx.generate();
        assert_eq!(Some("trackaudit".to_string()), doc.creator);
        assert_eq!(groups.len(), doc.waypoints.len());
        assert!(!doc.tracks.is_empty());
    }
}
