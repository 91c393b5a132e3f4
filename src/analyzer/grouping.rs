//! Grouping of consecutive anomalies

use serde::Serialize;

use super::anomaly::{Anomaly, AnomalyType};
use super::point::TrackPoint;

/// Run of anomalies of one type on adjacent point indexes
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupedAnomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    anomalies: Vec<Anomaly>,
}

impl GroupedAnomaly {
    fn open(first: Anomaly) -> Self {
        Self {
            kind: first.kind,
            anomalies: vec![first],
        }
    }

    fn accepts(&self, anomaly: &Anomaly) -> bool {
        let last = self.last_anomaly();
        anomaly.kind == self.kind && anomaly.point_index == last.point_index + 1
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_grouped(&self) -> bool {
        self.anomalies.len() > 1
    }

    pub fn first_anomaly(&self) -> &Anomaly {
        &self.anomalies[0]
    }

    pub fn last_anomaly(&self) -> &Anomaly {
        &self.anomalies[self.anomalies.len() - 1]
    }

    pub fn start_point(&self) -> &TrackPoint {
        &self.first_anomaly().start
    }

    pub fn end_point(&self) -> &TrackPoint {
        &self.last_anomaly().end
    }

    /// Aggregated description: total gap minutes, top speed, total jump
    /// distance or number of points out of bounds
    pub fn group_description(&self) -> String {
        if !self.is_grouped() {
            return self.first_anomaly().description.clone();
        }

        let values = self.anomalies.iter().filter_map(|a| a.value);

        match self.kind {
            AnomalyType::TimeGap => {
                format!("Time gap: {:.1} min (total)", values.sum::<f64>())
            }
            AnomalyType::SpeedSpike => {
                format!("Max speed: {:.1} km/h", values.fold(0.0, f64::max))
            }
            AnomalyType::PositionJump => {
                format!("Position jump: {:.0} m (total)", values.sum::<f64>())
            }
            AnomalyType::OutOfBounds => {
                format!("Points out of bounds: {}", self.anomalies.len())
            }
        }
    }
}

/// Collapse anomalies of the same type on consecutive point indexes
///
/// The input is stably sorted by point index first, so anomalies of
/// different types on the same pair keep their detection order.
pub fn group_consecutive_anomalies(mut anomalies: Vec<Anomaly>) -> Vec<GroupedAnomaly> {
    anomalies.sort_by_key(|a| a.point_index);

    let mut groups: Vec<GroupedAnomaly> = vec![];

    for anomaly in anomalies {
        if let Some(group) = groups.last_mut() {
            if group.accepts(&anomaly) {
                group.anomalies.push(anomaly);
                continue;
            }
        }
        groups.push(GroupedAnomaly::open(anomaly));
    }

    groups
}
