//! Report rendering for the analysis results

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use serde::Serialize;
use time::macros::format_description;
use time::{Duration, PrimitiveDateTime};

use crate::analyzer::segments::format_duration;
use crate::error::{Error, Result};
use crate::{Anomaly, AnomalyType, GroupedAnomaly, SegmentStats, TrackIssueType, TrackSegment};

pub mod gpx;

/// `24.05.24 08:00:00`, the format of the anomaly tables
pub fn format_time(time: PrimitiveDateTime) -> String {
    let format =
        format_description!("[day].[month].[year repr:last_two] [hour]:[minute]:[second]");
    time.format(format).unwrap_or_else(|_| time.to_string())
}

/// Anomaly group as listed to the user
#[derive(Debug, PartialEq, Serialize)]
pub struct GroupRow {
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub color: &'static str,
    pub count: usize,
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
    pub description: String,
}

impl From<&GroupedAnomaly> for GroupRow {
    fn from(group: &GroupedAnomaly) -> Self {
        Self {
            kind: group.kind,
            color: group.kind.color(),
            count: group.count(),
            start: group.start_point().timestamp,
            end: group.end_point().timestamp,
            description: group.group_description(),
        }
    }
}

/// Issue segment without its points
#[derive(Debug, PartialEq, Serialize)]
pub struct SegmentRow {
    pub primary_issue: TrackIssueType,
    pub color: &'static str,
    pub label: String,
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
    pub duration: String,
    pub count: usize,
    pub stats: SegmentStats,
}

impl From<&TrackSegment> for SegmentRow {
    fn from(segment: &TrackSegment) -> Self {
        let primary_issue = segment.primary_issue();
        Self {
            primary_issue,
            color: primary_issue.color(),
            label: segment.issues_label(),
            start: segment.start_time,
            end: segment.end_time,
            duration: segment.formatted_duration(),
            count: segment.count(),
            stats: segment.stats.clone(),
        }
    }
}

pub fn render_anomalies(anomalies: &[Anomaly]) -> String {
    let mut out = String::new();
    for a in anomalies {
        let _ = writeln!(
            out,
            "{:>5}  {} -> {}  {:<14} {}",
            a.point_index,
            format_time(a.start.timestamp),
            format_time(a.end.timestamp),
            a.kind.name(),
            a.description
        );
    }
    out
}

pub fn render_groups(groups: &[GroupedAnomaly]) -> String {
    let mut out = String::new();
    for row in groups.iter().map(GroupRow::from) {
        let _ = writeln!(
            out,
            "{} -> {}  {:<14} x{:<4} {}",
            format_time(row.start),
            format_time(row.end),
            row.kind.name(),
            row.count,
            row.description
        );
    }
    out
}

pub fn render_segments(segments: &[TrackSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let _ = writeln!(
            out,
            "{} -> {}  {:>12}  {:>5} pts  {:>8.0} m  {}",
            format_time(segment.start_time),
            format_time(segment.end_time),
            segment.formatted_duration(),
            segment.count(),
            segment.stats.distance_traveled,
            segment.issues_label()
        );
    }
    out
}

pub fn render_summary(summary: &BTreeMap<TrackIssueType, Duration>) -> String {
    let mut out = String::new();
    for (issue, duration) in summary {
        let _ = writeln!(out, "{:<24} {}", issue.display_name(), format_duration(*duration));
    }
    out
}

/// Serialize a GPX document
pub fn write_gpx<W: Write>(doc: &::gpx::Gpx, writer: W) -> Result<()> {
    ::gpx::write(doc, writer).map_err(|e| Error::Gpx(e.to_string()))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::gpx::GpxGenerator;
    use super::*;
    use crate::{analyze_segments, generate_summary, TrackPoint};

    #[test]
    fn times_and_durations() {
        assert_eq!("24.05.24 08:03:09", format_time(datetime!(2024-05-24 8:03:09)));
        assert_eq!("0 min", format_duration(Duration::seconds(59)));
        assert_eq!("59 min", format_duration(Duration::minutes(59)));
        assert_eq!("2 h 0 min", format_duration(Duration::minutes(120)));
    }

    #[test]
    fn summary_lines() {
        let t = datetime!(2024-05-24 8:00);
        let points = vec![
            TrackPoint::basic(50.45, 30.52, t, 30.0),
            TrackPoint::basic(50.45, 30.52, t + Duration::minutes(3), 30.0),
            TrackPoint {
                voltage: Some(10),
                ..TrackPoint::basic(50.45, 30.52, t + Duration::minutes(4), 30.0)
            },
            TrackPoint {
                voltage: Some(10),
                ..TrackPoint::basic(50.45, 30.52, t + Duration::minutes(9), 30.0)
            },
        ];

        let segments = analyze_segments(&points);
        let text = render_summary(&generate_summary(&segments));
        assert_eq!(
            "No issues                3 min\nLow voltage              5 min\n",
            text
        );

        let rows: Vec<SegmentRow> = segments.iter().map(SegmentRow::from).collect();
        assert_eq!(TrackIssueType::LowVoltage, rows[1].primary_issue);
        assert_eq!("#FF9800", rows[1].color);
        assert_eq!("Low voltage 10.0V", rows[1].label);
        assert_eq!(2, render_segments(&segments).lines().count());
    }

    #[test]
    fn gpx_is_written() -> Result<()> {
        let doc = GpxGenerator::empty().generate();
        let mut buffer = vec![];
        write_gpx(&doc, &mut buffer)?;

        let xml = String::from_utf8_lossy(&buffer);
        assert!(xml.contains("trackaudit"));

        Ok(())
    }
}
