//! Track issue types and their metadata table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum satellite count for a reliable fix
pub const LOW_SATELLITES_THRESHOLD: i32 = 8;
/// Minimum healthy battery voltage, volts
pub const LOW_VOLTAGE_THRESHOLD: i32 = 12;
/// Longest silence between samples, whole minutes
pub const TIME_GAP_MINUTES: i64 = 10;
/// Highest plausible calculated speed, km/h
pub const SPEED_SPIKE_THRESHOLD_KPH: f64 = 200.0;
/// Largest plausible altitude change between samples, meters
pub const ALTITUDE_SPIKE_THRESHOLD_M: f64 = 500.0;
/// Displacement that contradicts a zero reported speed, meters
pub const STATIC_MOVING_DISTANCE_M: f64 = 50.0;
/// Displacement counted as movement while the ignition is off, meters
pub const MOVEMENT_DISTANCE_M: f64 = 20.0;

/// Issue detected on a single track point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackIssueType {
    None,
    LowSatellites,
    LowVoltage,
    MovementWithoutPower,
    TimeGap,
    SpeedSpike,
    AltitudeSpike,
    StaticMoving,
}

/// Static description of an issue type
#[derive(Debug, PartialEq)]
pub struct IssueInfo {
    pub kind: TrackIssueType,
    pub name: &'static str,
    /// Hex RGB color used by map overlays
    pub color: &'static str,
    pub threshold: Option<f64>,
    /// Rank for primary issue selection, 0 is the most severe
    pub priority: Option<u8>,
}

/// Indexed by the enum discriminant
static ISSUE_TABLE: [IssueInfo; 8] = [
    IssueInfo {
        kind: TrackIssueType::None,
        name: "No issues",
        color: "#4CAF50",
        threshold: None,
        priority: None,
    },
    IssueInfo {
        kind: TrackIssueType::LowSatellites,
        name: "Low satellites",
        color: "#FFC107",
        threshold: Some(LOW_SATELLITES_THRESHOLD as f64),
        priority: Some(3),
    },
    IssueInfo {
        kind: TrackIssueType::LowVoltage,
        name: "Low voltage",
        color: "#FF9800",
        threshold: Some(LOW_VOLTAGE_THRESHOLD as f64),
        priority: Some(1),
    },
    IssueInfo {
        kind: TrackIssueType::MovementWithoutPower,
        name: "Movement without power",
        color: "#F44336",
        threshold: Some(MOVEMENT_DISTANCE_M),
        priority: Some(0),
    },
    IssueInfo {
        kind: TrackIssueType::TimeGap,
        name: "Data gap",
        color: "#9E9E9E",
        threshold: Some(TIME_GAP_MINUTES as f64),
        priority: Some(4),
    },
    IssueInfo {
        kind: TrackIssueType::SpeedSpike,
        name: "Speed spike",
        color: "#9C27B0",
        threshold: Some(SPEED_SPIKE_THRESHOLD_KPH),
        priority: Some(2),
    },
    IssueInfo {
        kind: TrackIssueType::AltitudeSpike,
        name: "Altitude anomaly",
        color: "#795548",
        threshold: Some(ALTITUDE_SPIKE_THRESHOLD_M),
        priority: Some(5),
    },
    IssueInfo {
        kind: TrackIssueType::StaticMoving,
        name: "Static movement",
        color: "#607D8B",
        threshold: Some(STATIC_MOVING_DISTANCE_M),
        priority: Some(6),
    },
];

impl TrackIssueType {
    pub const ALL: [TrackIssueType; 8] = [
        TrackIssueType::None,
        TrackIssueType::LowSatellites,
        TrackIssueType::LowVoltage,
        TrackIssueType::MovementWithoutPower,
        TrackIssueType::TimeGap,
        TrackIssueType::SpeedSpike,
        TrackIssueType::AltitudeSpike,
        TrackIssueType::StaticMoving,
    ];

    pub fn info(self) -> &'static IssueInfo {
        &ISSUE_TABLE[self as usize]
    }

    pub fn display_name(self) -> &'static str {
        self.info().name
    }

    pub fn color(self) -> &'static str {
        self.info().color
    }

    pub fn threshold(self) -> Option<f64> {
        self.info().threshold
    }

    pub fn priority(self) -> Option<u8> {
        self.info().priority
    }
}

impl fmt::Display for TrackIssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Most severe issue of a set, `None` for an empty set
pub fn primary_issue<'a, I>(issues: I) -> TrackIssueType
where
    I: IntoIterator<Item = &'a TrackIssueType>,
{
    issues
        .into_iter()
        .filter_map(|issue| issue.priority().map(|rank| (rank, *issue)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, issue)| issue)
        .unwrap_or(TrackIssueType::None)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn table_matches_discriminants() {
        for kind in TrackIssueType::ALL {
            assert_eq!(kind, kind.info().kind);
        }
    }

    #[test]
    fn priorities_are_unique() {
        let ranks: BTreeSet<u8> = TrackIssueType::ALL
            .iter()
            .filter_map(|k| k.priority())
            .collect();
        assert_eq!(7, ranks.len());
        assert_eq!(None, TrackIssueType::None.priority());
    }

    #[test]
    fn primary_issue_order() {
        let issues = BTreeSet::from([
            TrackIssueType::StaticMoving,
            TrackIssueType::LowSatellites,
            TrackIssueType::SpeedSpike,
        ]);
        assert_eq!(TrackIssueType::SpeedSpike, primary_issue(&issues));

        let issues = BTreeSet::from([
            TrackIssueType::LowVoltage,
            TrackIssueType::MovementWithoutPower,
        ]);
        assert_eq!(TrackIssueType::MovementWithoutPower, primary_issue(&issues));

        let issues = BTreeSet::from([TrackIssueType::TimeGap, TrackIssueType::AltitudeSpike]);
        assert_eq!(TrackIssueType::TimeGap, primary_issue(&issues));
    }

    #[test]
    fn primary_issue_of_empty_set() {
        assert_eq!(TrackIssueType::None, primary_issue(&BTreeSet::<TrackIssueType>::new()));
    }

    #[test]
    fn display_uses_table_name() {
        assert_eq!("Low voltage", TrackIssueType::LowVoltage.to_string());
        assert_eq!("#F44336", TrackIssueType::MovementWithoutPower.color());
        assert_eq!(Some(8.0), TrackIssueType::LowSatellites.threshold());
    }
}
