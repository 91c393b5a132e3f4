//! trackaudit - GPS track quality analysis: anomalies, issue segments and reports

mod analyzer;
pub mod error;
pub mod report;
pub mod sources;

pub use analyzer::anomaly::{
    detect_anomalies, detect_raw_track_anomalies, Anomaly, AnomalyType, DetectionProfile,
    JumpGate, ProfileOverrides,
};
pub use analyzer::geo::{
    calculated_speed_kph, distance_between, haversine_distance, GeoBounds, EARTH_RADIUS_M,
};
pub use analyzer::grouping::{group_consecutive_anomalies, GroupedAnomaly};
pub use analyzer::issue::{primary_issue, IssueInfo, TrackIssueType};
pub use analyzer::point::TrackPoint;
pub use analyzer::segments::{
    analyze_segments, detect_issues, format_duration, generate_summary, SegmentStats,
    TrackSegment,
};
pub use error::{Error, Result};
pub use sources::{DevicePoint, FieldsConfiguration, PointsSource, SourceToDevices};
