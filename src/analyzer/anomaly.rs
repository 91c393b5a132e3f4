//! Point to point anomaly detection

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use time::Duration;

use super::geo::{calculated_speed_kph, distance_between, elapsed, GeoBounds};
use super::point::TrackPoint;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    TimeGap,
    SpeedSpike,
    PositionJump,
    OutOfBounds,
}

impl AnomalyType {
    pub fn name(self) -> &'static str {
        match self {
            AnomalyType::TimeGap => "Time gap",
            AnomalyType::SpeedSpike => "Speed spike",
            AnomalyType::PositionJump => "Position jump",
            AnomalyType::OutOfBounds => "Out of bounds",
        }
    }

    /// Overlay color on the map
    pub fn color(self) -> &'static str {
        match self {
            AnomalyType::TimeGap | AnomalyType::PositionJump => "#ff4136",
            AnomalyType::SpeedSpike => "#ffdc00",
            AnomalyType::OutOfBounds => "#800080",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Irregularity between two adjacent points, or on a single point
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub start: TrackPoint,
    pub end: TrackPoint,
    pub description: String,
    /// Minutes, km/h or meters, depending on the type
    pub value: Option<f64>,
    /// Index in the time sorted track
    pub point_index: usize,
}

impl Anomaly {
    fn out_of_bounds(point: &TrackPoint, point_index: usize) -> Self {
        Self {
            kind: AnomalyType::OutOfBounds,
            start: point.clone(),
            end: point.clone(),
            description: format!(
                "Point out of bounds: {:.4}, {:.4}",
                point.latitude, point.longitude
            ),
            value: None,
            point_index,
        }
    }

    /// Anomaly on the pair starting at `point_index`
    fn between(
        kind: AnomalyType,
        p1: &TrackPoint,
        p2: &TrackPoint,
        value: f64,
        description: String,
        point_index: usize,
    ) -> Self {
        Self {
            kind,
            start: p1.clone(),
            end: p2.clone(),
            description,
            value: Some(value),
            point_index,
        }
    }

    fn time_gap(p1: &TrackPoint, p2: &TrackPoint, minutes: f64, point_index: usize) -> Self {
        let description = format!("Time gap: {:.1} min", minutes);
        Self::between(AnomalyType::TimeGap, p1, p2, minutes, description, point_index)
    }

    fn speed_spike(p1: &TrackPoint, p2: &TrackPoint, speed: f64, point_index: usize) -> Self {
        let description = format!("Speed spike: {:.1} km/h", speed);
        Self::between(AnomalyType::SpeedSpike, p1, p2, speed, description, point_index)
    }

    fn position_jump(p1: &TrackPoint, p2: &TrackPoint, distance: f64, point_index: usize) -> Self {
        let description = format!("Position jump: {:.0} m", distance);
        Self::between(AnomalyType::PositionJump, p1, p2, distance, description, point_index)
    }
}

/// Extra condition of the position jump check: the device reports a low
/// speed while the points are really far apart
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct JumpGate {
    /// Both points must report less than this, km/h
    pub max_device_speed_kph: f64,
    /// The calculated speed must exceed this, km/h
    pub min_calculated_speed_kph: f64,
}

impl Default for JumpGate {
    fn default() -> Self {
        Self {
            max_device_speed_kph: 50.0,
            min_calculated_speed_kph: 10.0,
        }
    }
}

/// Thresholds applied by [`detect_anomalies`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionProfile {
    /// Longest accepted silence between two samples
    pub max_gap: Duration,
    /// Highest accepted calculated speed, km/h
    pub max_speed_kph: f64,
    /// Displacement flagged as a position jump, meters
    pub jump_distance_m: f64,
    /// Flag displacements equal to `jump_distance_m` too
    pub jump_inclusive: bool,
    pub jump_gate: Option<JumpGate>,
    pub bounds: GeoBounds,
}

impl DetectionProfile {
    /// Thresholds for the aggregated mileage track
    pub fn mileage() -> Self {
        Self {
            max_gap: Duration::minutes(10),
            max_speed_kph: 200.0,
            jump_distance_m: 800.0,
            jump_inclusive: false,
            jump_gate: Some(JumpGate::default()),
            bounds: GeoBounds::UKRAINE,
        }
    }

    /// Thresholds for the raw device track
    pub fn raw_track() -> Self {
        Self {
            max_gap: Duration::minutes(30),
            max_speed_kph: 150.0,
            jump_distance_m: 1200.0,
            jump_inclusive: true,
            jump_gate: None,
            bounds: GeoBounds::UKRAINE,
        }
    }

    /// Replace the thresholds set in `overrides`
    ///
    /// Speed and distance thresholds must be positive numbers.
    pub fn with_overrides(mut self, overrides: &ProfileOverrides) -> Result<Self> {
        if let Some(minutes) = overrides.max_gap_minutes {
            self.max_gap = Duration::minutes(i64::from(minutes));
        }
        if let Some(speed) = overrides.max_speed_kph {
            self.max_speed_kph = positive("max_speed_kph", speed)?;
        }
        if let Some(distance) = overrides.jump_distance_m {
            self.jump_distance_m = positive("jump_distance_m", distance)?;
        }
        if let Some(inclusive) = overrides.jump_inclusive {
            self.jump_inclusive = inclusive;
        }
        if let Some(gate) = overrides.jump_gate {
            positive("jump_gate.max_device_speed_kph", gate.max_device_speed_kph)?;
            positive("jump_gate.min_calculated_speed_kph", gate.min_calculated_speed_kph)?;
            self.jump_gate = Some(gate);
        }
        match overrides.jump_gate_enabled {
            Some(false) => self.jump_gate = None,
            Some(true) if self.jump_gate.is_none() => self.jump_gate = Some(JumpGate::default()),
            _ => {}
        }
        if let Some(bounds) = overrides.bounds {
            self.bounds = bounds;
        }

        Ok(self)
    }

    fn is_position_jump(
        &self,
        p1: &TrackPoint,
        p2: &TrackPoint,
        distance: f64,
        calculated_speed: f64,
    ) -> bool {
        let far = if self.jump_inclusive {
            distance >= self.jump_distance_m
        } else {
            distance > self.jump_distance_m
        };

        match self.jump_gate {
            None => far,
            Some(gate) => {
                far && p1.speed < gate.max_device_speed_kph
                    && p2.speed < gate.max_device_speed_kph
                    && calculated_speed > gate.min_calculated_speed_kph
            }
        }
    }
}

impl Default for DetectionProfile {
    fn default() -> Self {
        Self::mileage()
    }
}

/// Partial profile, as read from the configuration file
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    pub max_gap_minutes: Option<u32>,
    pub max_speed_kph: Option<f64>,
    pub jump_distance_m: Option<f64>,
    pub jump_inclusive: Option<bool>,
    pub jump_gate: Option<JumpGate>,
    /// `false` drops the jump gate, `true` restores the default one when
    /// the profile has none
    pub jump_gate_enabled: Option<bool>,
    pub bounds: Option<GeoBounds>,
}

fn positive(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Scan the consecutive pairs of the time sorted track
///
/// Anomalies come out in detection order: by pair, then out of bounds,
/// time gap, speed spike and position jump.
pub fn detect_anomalies(points: &[TrackPoint], profile: &DetectionProfile) -> Vec<Anomaly> {
    if points.len() < 2 {
        return vec![];
    }

    let mut sorted: Vec<&TrackPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let mut anomalies = vec![];

    for (i, pair) in sorted.windows(2).enumerate() {
        let (p1, p2) = (pair[0], pair[1]);

        if i == 0 && profile.bounds.is_outside(p1.latitude, p1.longitude) {
            anomalies.push(Anomaly::out_of_bounds(p1, i));
        }
        if profile.bounds.is_outside(p2.latitude, p2.longitude) {
            anomalies.push(Anomaly::out_of_bounds(p2, i + 1));
        }

        let gap = elapsed(p1, p2);
        if gap > profile.max_gap {
            let minutes = gap.whole_milliseconds() as f64 / 60_000.0;
            anomalies.push(Anomaly::time_gap(p1, p2, minutes, i));
        }

        let distance = distance_between(p1, p2);
        let speed = calculated_speed_kph(p1, p2);

        if let Some(speed) = speed.filter(|s| *s > profile.max_speed_kph) {
            anomalies.push(Anomaly::speed_spike(p1, p2, speed, i));
        }

        if profile.is_position_jump(p1, p2, distance, speed.unwrap_or(0.0)) {
            anomalies.push(Anomaly::position_jump(p1, p2, distance, i));
        }
    }

    debug!(
        "{} anomalies found over {} points",
        anomalies.len(),
        sorted.len()
    );

    anomalies
}

/// [`detect_anomalies`] with the raw device track thresholds
pub fn detect_raw_track_anomalies(points: &[TrackPoint]) -> Vec<Anomaly> {
    detect_anomalies(points, &DetectionProfile::raw_track())
}
