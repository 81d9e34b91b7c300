//! Point and trend anomaly detection over per-group daily cost series.
//!
//! Point anomalies compare the most recent day against the rest of the window
//! using a median/MAD modified z-score. Trend anomalies fit a Theil–Sen slope
//! over the whole window and express it as total drift relative to the median.
//! Groups without enough history are skipped, never reported as errors.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::anomaly::{rank_anomalies, Anomaly, DriftFraction, Signal, ZScore};
use super::dimension::GroupBy;
use super::stats;
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::{AggregateQuery, AggregateReader, DataSource};
use crate::utils::dates::days_before;

/// Fewer observations than this and a group is not judged at all.
pub const MIN_OBSERVATIONS: usize = 3;

/// Fewer observations than this and no slope is fitted.
pub const MIN_TREND_OBSERVATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Minimum |z-score| for a point anomaly.
    pub fn threshold(&self) -> f64 {
        match self {
            Sensitivity::Low => 3.0,
            Sensitivity::Medium => 2.5,
            Sensitivity::High => 2.0,
        }
    }

    /// Like `parse`, but an unknown name falls back to medium.
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(sensitivity = name, "Unknown sensitivity, falling back to medium");
            Sensitivity::Medium
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(format!("sensitivity must be one of low, medium, high (got '{other}')")),
        }
    }
}

/// Parameters for a single detection run.
#[derive(Debug, Clone)]
pub struct DetectParams {
    /// Days of history before the reference date. The window covers
    /// `[reference_date - window_days, reference_date]` inclusive.
    pub window_days: u32,
    pub group_by: GroupBy,
    pub sensitivity: Sensitivity,
    pub min_daily_cost: f64,
    /// Fractional drift over the window that counts as a trend (0.20 = 20%).
    pub drift_threshold: f64,
    pub data_source: Option<DataSource>,
    /// Defaults to today (UTC).
    pub reference_date: Option<NaiveDate>,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            window_days: 14,
            group_by: GroupBy::default(),
            sensitivity: Sensitivity::Medium,
            min_daily_cost: 1.0,
            drift_threshold: 0.20,
            data_source: None,
            reference_date: None,
        }
    }
}

impl DetectParams {
    pub fn with_reference_date(&self, reference_date: NaiveDate) -> Self {
        Self {
            reference_date: Some(reference_date),
            ..self.clone()
        }
    }

    pub fn effective_reference_date(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Inclusive `(start, end)` of the window.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        let end = self.effective_reference_date();
        (days_before(end, self.window_days), end)
    }
}

pub struct AnomalyDetector<R> {
    reader: R,
}

impl<R: AggregateReader> AnomalyDetector<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Runs point and trend detection for every group in the window and
    /// returns the anomalies ranked most severe first.
    ///
    /// Store failures propagate unchanged.
    pub fn detect(&self, params: &DetectParams) -> CostAnomalyResult<Vec<Anomaly>> {
        let (start, end) = params.window();
        let rows = self
            .reader
            .daily_costs(&AggregateQuery {
                start,
                end,
                group_by: &params.group_by,
                data_source: params.data_source,
            })
            .map_err(CostAnomalyError::Store)?;

        let mut groups: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
        for row in rows {
            groups
                .entry(GroupBy::group_value(&row.dimension_values))
                .or_default()
                .push((row.usage_date, row.daily_cost));
        }

        let group_count = groups.len();
        let mut anomalies: Vec<Anomaly> = groups
            .into_iter()
            .flat_map(|(group_value, mut series)| {
                series.sort_by_key(|(date, _)| *date);
                analyze_series(&params.group_by, group_value, &series, params)
            })
            .collect();
        rank_anomalies(&mut anomalies);

        info!(
            group_by = %params.group_by,
            window_start = %start,
            window_end = %end,
            groups = group_count,
            anomalies = anomalies.len(),
            "Anomaly detection complete"
        );
        Ok(anomalies)
    }
}

/// Judges one group's date-ordered series. The last entry is the current day,
/// everything before it is the baseline.
pub fn analyze_series(
    group_by: &GroupBy,
    group_value: String,
    series: &[(NaiveDate, f64)],
    params: &DetectParams,
) -> Vec<Anomaly> {
    let mut found = Vec::new();
    if series.len() < MIN_OBSERVATIONS {
        debug!(group = %group_value, observations = series.len(), "Skipping group with too little history");
        return found;
    }
    let Some((&(current_date, current_cost), baseline)) = series.split_last() else {
        return found;
    };

    let baseline_costs: Vec<f64> = baseline.iter().map(|(_, cost)| *cost).collect();
    let Some(median) = stats::median(&baseline_costs) else {
        return found;
    };
    let mad = stats::median_absolute_deviation(&baseline_costs, median).unwrap_or(0.0);

    if current_cost < params.min_daily_cost {
        debug!(group = %group_value, current_cost, "Current cost below minimum, skipping group");
        return found;
    }

    if let Some(z) = stats::modified_z_score(current_cost, median, mad, params.min_daily_cost) {
        if z.abs() >= params.sensitivity.threshold() {
            found.push(Anomaly::new(
                current_date,
                group_by.clone(),
                group_value.clone(),
                current_cost,
                median,
                mad,
                Signal::Point { z_score: ZScore(z) },
            ));
        }
    }

    if series.len() >= MIN_TREND_OBSERVATIONS && median > params.min_daily_cost {
        let costs: Vec<f64> = series.iter().map(|(_, cost)| *cost).collect();
        if let Some(slope) = stats::theil_sen_slope(&costs) {
            let drift = slope * costs.len() as f64 / median;
            if drift.abs() >= params.drift_threshold {
                found.push(Anomaly::new(
                    current_date,
                    group_by.clone(),
                    group_value,
                    current_cost,
                    median,
                    mad,
                    Signal::Trend { drift: DriftFraction(drift) },
                ));
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::anomaly::{AnomalyKind, Direction};
    use chrono::Days;

    fn series(costs: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        costs
            .iter()
            .enumerate()
            .map(|(i, c)| (start + Days::new(i as u64), *c))
            .collect()
    }

    fn analyze(costs: &[f64], params: &DetectParams) -> Vec<Anomaly> {
        analyze_series(&GroupBy::default(), "AmazonEC2".into(), &series(costs), params)
    }

    #[test]
    fn test_sensitivity_thresholds() {
        assert_eq!(Sensitivity::Low.threshold(), 3.0);
        assert_eq!(Sensitivity::Medium.threshold(), 2.5);
        assert_eq!(Sensitivity::High.threshold(), 2.0);
        assert_eq!(Sensitivity::from_name_lossy("extreme"), Sensitivity::Medium);
        assert!("extreme".parse::<Sensitivity>().is_err());
    }

    #[test]
    fn test_window_bounds() {
        let params = DetectParams {
            reference_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            ..DetectParams::default()
        };
        let (start, end) = params.window();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn test_too_few_observations_skipped() {
        assert!(analyze(&[100.0, 900.0], &DetectParams::default()).is_empty());
    }

    #[test]
    fn test_flat_series_has_no_anomaly() {
        assert!(analyze(&[42.0; 14], &DetectParams::default()).is_empty());
    }

    #[test]
    fn test_spike_against_noisy_baseline() {
        let mut costs = vec![98.0, 102.0, 100.0, 101.0, 99.0, 100.0, 103.0, 97.0, 100.0, 101.0, 99.0, 100.0, 102.0];
        costs.push(180.0);
        let found = analyze(&costs, &DetectParams::default());
        let point = found.iter().find(|a| a.kind() == AnomalyKind::Point).unwrap();
        assert_eq!(point.direction, Direction::Spike);
        assert!(point.z_score() > 2.5);
        assert!(point.mad > 0.0);
    }

    #[test]
    fn test_drop_detected() {
        let mut costs = vec![100.0; 13];
        costs.push(10.0);
        let found = analyze(&costs, &DetectParams::default());
        let point = found.iter().find(|a| a.kind() == AnomalyKind::Point).unwrap();
        assert_eq!(point.direction, Direction::Drop);
        assert_eq!(point.z_score(), -10.0);
    }

    #[test]
    fn test_group_winding_down_below_minimum_is_skipped() {
        // Steep decline would otherwise read as a critical downward drift.
        let mut costs: Vec<f64> = (0..14).map(|i| (100.0 - 7.1 * i as f64).max(0.5)).collect();
        costs.push(0.6);
        let params = DetectParams { min_daily_cost: 1.0, ..DetectParams::default() };
        assert!(analyze(&costs, &params).is_empty());
    }

    #[test]
    fn test_gradual_drift_up() {
        let costs: Vec<f64> = (0..14).map(|d| 100.0 + d as f64 * (40.0 / 13.0)).collect();
        let found = analyze(&costs, &DetectParams::default());
        let trend = found.iter().find(|a| a.kind() == AnomalyKind::Trend).unwrap();
        assert_eq!(trend.direction, Direction::DriftUp);
        assert!(trend.z_score() > 0.20);
    }

    #[test]
    fn test_small_drift_not_flagged() {
        let costs: Vec<f64> = (0..14).map(|d| 100.0 + d as f64 * (10.0 / 13.0)).collect();
        let found = analyze(&costs, &DetectParams::default());
        assert!(found.iter().all(|a| a.kind() != AnomalyKind::Trend));
    }

    #[test]
    fn test_trend_needs_five_observations() {
        let found = analyze(&[100.0, 150.0, 200.0, 250.0], &DetectParams::default());
        assert!(found.iter().all(|a| a.kind() != AnomalyKind::Trend));
    }
}
