//! Issue classification and segmentation of a track

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;
use time::{Duration, PrimitiveDateTime};

use super::geo::{calculated_speed_kph, distance_between, elapsed};
use super::issue::*;
use super::point::TrackPoint;

/// Aggregates over the points of a segment
///
/// Satellite and voltage figures are `None` when no point reports them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub avg_satellites: Option<f64>,
    pub min_satellites: Option<i32>,
    pub max_satellites: Option<i32>,
    pub avg_voltage: Option<f64>,
    pub min_voltage: Option<i32>,
    pub max_voltage: Option<i32>,
    pub avg_speed: f64,
    pub max_speed: f64,
    /// Sum of the distances between consecutive points, meters
    pub distance_traveled: f64,
}

impl SegmentStats {
    pub fn from_points(points: &[TrackPoint]) -> Self {
        let satellites: Vec<i32> = points.iter().filter_map(|p| p.satellites).collect();
        let voltages: Vec<i32> = points.iter().filter_map(|p| p.voltage).collect();
        let speeds: Vec<f64> = points.iter().map(|p| p.speed).collect();

        let distance_traveled = points
            .windows(2)
            .map(|w| distance_between(&w[0], &w[1]))
            .sum();

        Self {
            avg_satellites: average(satellites.iter().map(|s| *s as f64)),
            min_satellites: satellites.iter().copied().min(),
            max_satellites: satellites.iter().copied().max(),
            avg_voltage: average(voltages.iter().map(|v| *v as f64)),
            min_voltage: voltages.iter().copied().min(),
            max_voltage: voltages.iter().copied().max(),
            avg_speed: average(speeds.iter().copied()).unwrap_or(0.0),
            max_speed: speeds.iter().copied().reduce(f64::max).unwrap_or(0.0),
            distance_traveled,
        }
    }
}

fn average<I>(values: I) -> Option<f64>
where
    I: ExactSizeIterator<Item = f64>,
{
    let count = values.len();
    if count == 0 {
        return None;
    }

    Some(values.sum::<f64>() / count as f64)
}

/// Maximal run of consecutive points sharing the same issue set
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSegment {
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub issues: BTreeSet<TrackIssueType>,
    pub points: Vec<TrackPoint>,
    pub duration: Duration,
    pub stats: SegmentStats,
}

impl TrackSegment {
    /// Build a segment from time sorted, non empty points
    fn new(issues: BTreeSet<TrackIssueType>, points: Vec<TrackPoint>) -> Self {
        let start_time = points[0].timestamp;
        let end_time = points[points.len() - 1].timestamp;
        let stats = SegmentStats::from_points(&points);

        Self {
            start_time,
            end_time,
            issues,
            points,
            duration: end_time - start_time,
            stats,
        }
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    /// Most severe issue, used to pick the segment color
    pub fn primary_issue(&self) -> TrackIssueType {
        primary_issue(&self.issues)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration)
    }

    /// Issue names joined with ` + `, with average voltage and satellite
    /// count when known
    pub fn issues_label(&self) -> String {
        if self.issues.is_empty() {
            return TrackIssueType::None.display_name().to_string();
        }

        self.issues
            .iter()
            .map(|issue| {
                let detail = match issue {
                    TrackIssueType::LowVoltage => {
                        self.stats.avg_voltage.map(|v| format!("{:.1}V", v))
                    }
                    TrackIssueType::LowSatellites => {
                        self.stats.avg_satellites.map(|s| format!("{:.1}", s))
                    }
                    _ => None,
                };

                match detail {
                    Some(detail) => format!("{} {}", issue.display_name(), detail),
                    None => issue.display_name().to_string(),
                }
            })
            .collect::<Vec<String>>()
            .join(" + ")
    }
}

/// `1 h 5 min` or `42 min`
pub fn format_duration(duration: Duration) -> String {
    let hours = duration.whole_hours();
    let minutes = duration.whole_minutes() % 60;

    if hours > 0 {
        format!("{} h {} min", hours, minutes)
    } else {
        format!("{} min", minutes)
    }
}

/// Issues of `current`; checks comparing against the previous sample are
/// skipped when there is none
pub fn detect_issues(current: &TrackPoint, prev: Option<&TrackPoint>) -> BTreeSet<TrackIssueType> {
    let mut issues = BTreeSet::new();

    if current.satellites.map_or(false, |s| s < LOW_SATELLITES_THRESHOLD) {
        issues.insert(TrackIssueType::LowSatellites);
    }

    if current.voltage.map_or(false, |v| v < LOW_VOLTAGE_THRESHOLD) {
        issues.insert(TrackIssueType::LowVoltage);
    }

    let prev = match prev {
        Some(prev) => prev,
        None => return issues,
    };

    if elapsed(prev, current).whole_minutes() > TIME_GAP_MINUTES {
        issues.insert(TrackIssueType::TimeGap);
    }

    let distance = distance_between(prev, current);

    let ignition = current.ignition.unwrap_or(true);
    let moving = current.moving.unwrap_or(false);
    if !ignition && (moving || distance > MOVEMENT_DISTANCE_M) {
        issues.insert(TrackIssueType::MovementWithoutPower);
    }

    if calculated_speed_kph(prev, current).map_or(false, |s| s > SPEED_SPIKE_THRESHOLD_KPH) {
        issues.insert(TrackIssueType::SpeedSpike);
    }

    if let (Some(prev_alt), Some(alt)) = (prev.altitude, current.altitude) {
        if (alt - prev_alt).abs() > ALTITUDE_SPIKE_THRESHOLD_M {
            issues.insert(TrackIssueType::AltitudeSpike);
        }
    }

    if current.speed == 0.0 && distance > STATIC_MOVING_DISTANCE_M {
        issues.insert(TrackIssueType::StaticMoving);
    }

    issues
}

/// Classify every point of the time sorted track and merge consecutive
/// points with equal issue sets into segments
pub fn analyze_segments(points: &[TrackPoint]) -> Vec<TrackSegment> {
    let mut sorted: Vec<&TrackPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let mut runs: Vec<(BTreeSet<TrackIssueType>, Vec<TrackPoint>)> = vec![];
    let mut prev: Option<&TrackPoint> = None;

    for point in sorted {
        let issues = detect_issues(point, prev);

        prev = Some(point);

        if let Some((run_issues, run_points)) = runs.last_mut() {
            if *run_issues == issues {
                run_points.push(point.clone());
                continue;
            }
        }
        runs.push((issues, vec![point.clone()]));
    }

    let segments: Vec<TrackSegment> = runs
        .into_iter()
        .map(|(issues, points)| TrackSegment::new(issues, points))
        .collect();

    debug!(
        "{} points condensed into {} segments",
        points.len(),
        segments.len()
    );

    segments
}

/// Total time spent under each primary issue
pub fn generate_summary(segments: &[TrackSegment]) -> BTreeMap<TrackIssueType, Duration> {
    let mut summary = BTreeMap::new();

    for segment in segments {
        *summary
            .entry(segment.primary_issue())
            .or_insert(Duration::ZERO) += segment.duration;
    }

    summary
}
