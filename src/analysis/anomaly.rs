use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use super::dimension::GroupBy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank, most severe first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modified z-score of a point anomaly.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ZScore(pub f64);

impl ZScore {
    pub fn severity(self) -> Severity {
        let magnitude = self.0.abs();
        if magnitude > 4.0 {
            Severity::Critical
        } else if magnitude > 3.0 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Total drift across the window as a fraction of the baseline median (0.2 = 20%).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct DriftFraction(pub f64);

impl DriftFraction {
    pub fn severity(self) -> Severity {
        let magnitude = self.0.abs();
        if magnitude > 1.0 {
            Severity::Critical
        } else if magnitude > 0.5 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Point,
    Trend,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Point => "point",
            AnomalyKind::Trend => "trend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Spike,
    Drop,
    DriftUp,
    DriftDown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Spike => "spike",
            Direction::Drop => "drop",
            Direction::DriftUp => "drift_up",
            Direction::DriftDown => "drift_down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What tripped the detector. The two payloads live on different scales and
/// are only ever compared against their own kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Point {
        z_score: ZScore,
    },
    Trend {
        #[serde(rename = "z_score")]
        drift: DriftFraction,
    },
}

impl Signal {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            Signal::Point { .. } => AnomalyKind::Point,
            Signal::Trend { .. } => AnomalyKind::Trend,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Signal::Point { z_score } if z_score.0 > 0.0 => Direction::Spike,
            Signal::Point { .. } => Direction::Drop,
            Signal::Trend { drift } if drift.0 > 0.0 => Direction::DriftUp,
            Signal::Trend { .. } => Direction::DriftDown,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Signal::Point { z_score } => z_score.severity(),
            Signal::Trend { drift } => drift.severity(),
        }
    }

    /// Raw signed value: z-score for points, drift fraction for trends.
    pub fn value(&self) -> f64 {
        match self {
            Signal::Point { z_score } => z_score.0,
            Signal::Trend { drift } => drift.0,
        }
    }
}

/// A detected cost anomaly for one group on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub usage_date: NaiveDate,
    pub group_by: GroupBy,
    pub group_value: String,
    pub current_cost: f64,
    pub median_cost: f64,
    pub mad: f64,
    #[serde(flatten)]
    pub signal: Signal,
    pub severity: Severity,
    pub direction: Direction,
}

impl Anomaly {
    pub(crate) fn new(
        usage_date: NaiveDate,
        group_by: GroupBy,
        group_value: String,
        current_cost: f64,
        median_cost: f64,
        mad: f64,
        signal: Signal,
    ) -> Self {
        Self {
            usage_date,
            group_by,
            group_value,
            current_cost,
            median_cost,
            mad,
            severity: signal.severity(),
            direction: signal.direction(),
            signal,
        }
    }

    pub fn kind(&self) -> AnomalyKind {
        self.signal.kind()
    }

    /// The shared `z_score` field. Not comparable across kinds.
    pub fn z_score(&self) -> f64 {
        self.signal.value()
    }

    /// True when `self` is further from normal than `other` on their common scale.
    /// Anomalies of different kinds are never more extreme than one another.
    pub fn is_more_extreme_than(&self, other: &Anomaly) -> bool {
        match (&self.signal, &other.signal) {
            (Signal::Point { z_score: a }, Signal::Point { z_score: b }) => a.0.abs() > b.0.abs(),
            (Signal::Trend { drift: a }, Signal::Trend { drift: b }) => a.0.abs() > b.0.abs(),
            _ => false,
        }
    }
}

/// Severity tier first, then kind (point before trend), then magnitude on the
/// kind's own scale, largest first. Group value breaks remaining ties.
pub fn ranking(a: &Anomaly, b: &Anomaly) -> Ordering {
    a.severity
        .rank()
        .cmp(&b.severity.rank())
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| b.z_score().abs().total_cmp(&a.z_score().abs()))
        .then_with(|| a.group_value.cmp(&b.group_value))
}

pub fn rank_anomalies(anomalies: &mut [Anomaly]) {
    anomalies.sort_by(ranking);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dimension::GroupBy;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
    }

    fn point(group: &str, z: f64) -> Anomaly {
        Anomaly::new(date(), GroupBy::default(), group.into(), 0.0, 0.0, 0.0, Signal::Point { z_score: ZScore(z) })
    }

    fn trend(group: &str, d: f64) -> Anomaly {
        Anomaly::new(date(), GroupBy::default(), group.into(), 0.0, 0.0, 0.0, Signal::Trend { drift: DriftFraction(d) })
    }

    #[test]
    fn test_point_severity() {
        assert_eq!(ZScore(5.0).severity(), Severity::Critical);
        assert_eq!(ZScore(-4.5).severity(), Severity::Critical);
        assert_eq!(ZScore(3.5).severity(), Severity::Warning);
        assert_eq!(ZScore(-3.1).severity(), Severity::Warning);
        assert_eq!(ZScore(2.5).severity(), Severity::Info);
        assert_eq!(ZScore(4.0).severity(), Severity::Warning);
    }

    #[test]
    fn test_drift_severity() {
        assert_eq!(DriftFraction(1.5).severity(), Severity::Critical);
        assert_eq!(DriftFraction(-1.2).severity(), Severity::Critical);
        assert_eq!(DriftFraction(0.7).severity(), Severity::Warning);
        assert_eq!(DriftFraction(0.3).severity(), Severity::Info);
        assert_eq!(DriftFraction(1.0).severity(), Severity::Warning);
        assert_eq!(DriftFraction(0.5).severity(), Severity::Info);
    }

    #[test]
    fn test_direction_follows_sign() {
        assert_eq!(point("a", 3.0).direction, Direction::Spike);
        assert_eq!(point("a", -3.0).direction, Direction::Drop);
        assert_eq!(trend("a", 0.3).direction, Direction::DriftUp);
        assert_eq!(trend("a", -0.3).direction, Direction::DriftDown);
    }

    #[test]
    fn test_ranking_never_mixes_scales() {
        // Same tier: a 0.45 drift must not outrank a 2.6 z-score or vice versa by raw value.
        let mut anomalies = vec![trend("t", 0.45), point("p-small", 2.6), point("p-big", 3.0), point("crit", 9.0)];
        rank_anomalies(&mut anomalies);
        let order: Vec<&str> = anomalies.iter().map(|a| a.group_value.as_str()).collect();
        assert_eq!(order, vec!["crit", "p-big", "p-small", "t"]);
    }

    #[test]
    fn test_is_more_extreme_than_same_kind_only() {
        assert!(point("a", -6.0).is_more_extreme_than(&point("a", 5.0)));
        assert!(!trend("a", 0.9).is_more_extreme_than(&point("a", 0.1)));
    }

    #[test]
    fn test_serializes_flat_record() {
        let json = serde_json::to_value(trend("AmazonEC2", -0.25)).unwrap();
        assert_eq!(json["kind"], "trend");
        assert_eq!(json["z_score"], -0.25);
        assert_eq!(json["direction"], "drift_down");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["group_by"], "service");
        assert_eq!(json["usage_date"], "2025-01-14");
    }
}
