//! Context for a single flagged day: how it compares with the days before it
//! and whether the cost stayed high afterwards.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::dimension::{Dimension, GroupBy};
use super::stats;
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::{AggregateQuery, AggregateReader, DataSource};
use crate::utils::dates::{days_after, days_before};

/// Days after the anomaly checked for elevated cost.
pub const LOOK_AHEAD_DAYS: u32 = 7;
/// A later day is elevated when it exceeds this multiple of the baseline median.
pub const ELEVATED_MULTIPLE: f64 = 1.5;

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyExplanation {
    pub service: String,
    pub account_id: Option<String>,
    pub anomaly_date: NaiveDate,
    pub anomaly_cost: f64,
    /// False when no day in the baseline window had cost; the baseline
    /// figures then fall back to the anomaly cost.
    pub has_baseline: bool,
    pub baseline_days: u32,
    pub baseline_median: f64,
    pub baseline_min: f64,
    pub baseline_max: f64,
    pub cost_vs_median: f64,
    /// Zero when the baseline median is zero.
    pub cost_multiple: f64,
    pub elevated_days_after: usize,
    pub days_observed_after: usize,
    pub is_ongoing: bool,
    /// Per-day cost from the start of the baseline through the look-ahead.
    pub daily_costs: Vec<(NaiveDate, f64)>,
}

/// Explains the cost of `service` (optionally narrowed to one account) on
/// `anomaly_date` against the `baseline_days` before it.
///
/// Returns `NoData` when the group has no cost on the anomaly day.
pub fn explain_anomaly<R: AggregateReader>(
    reader: &R,
    service: &str,
    anomaly_date: NaiveDate,
    account_id: Option<&str>,
    baseline_days: u32,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<AnomalyExplanation> {
    let group_by = match account_id {
        Some(_) => GroupBy::new(vec![Dimension::Service, Dimension::Account])?,
        None => GroupBy::single(Dimension::Service),
    };
    let baseline_start = days_before(anomaly_date, baseline_days);
    let rows = reader
        .daily_costs(&AggregateQuery {
            start: baseline_start,
            end: days_after(anomaly_date, LOOK_AHEAD_DAYS),
            group_by: &group_by,
            data_source,
        })
        .map_err(CostAnomalyError::Store)?;

    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        let service_matches = row.dimension_values.first().and_then(Option::as_deref) == Some(service);
        let account_matches = account_id.is_none() || row.dimension_values.get(1).and_then(Option::as_deref) == account_id;
        if service_matches && account_matches {
            *by_day.entry(row.usage_date).or_insert(0.0) += row.daily_cost;
        }
    }

    let group = match account_id {
        Some(account) => GroupBy::group_value(&[Some(service), Some(account)]),
        None => service.to_string(),
    };
    let anomaly_cost = by_day
        .get(&anomaly_date)
        .copied()
        .ok_or_else(|| CostAnomalyError::NoData { group: group.clone(), date: anomaly_date })?;

    let baseline: Vec<f64> = by_day.range(baseline_start..anomaly_date).map(|(_, cost)| *cost).collect();
    let (has_baseline, baseline_median, baseline_min, baseline_max) = match stats::median(&baseline) {
        Some(median) => (
            true,
            median,
            baseline.iter().copied().fold(f64::INFINITY, f64::min),
            baseline.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ),
        None => {
            debug!(group = %group, date = %anomaly_date, "No baseline cost, comparing against the day itself");
            (false, anomaly_cost, anomaly_cost, anomaly_cost)
        }
    };

    let after: Vec<f64> = by_day
        .range(days_after(anomaly_date, 1)..)
        .map(|(_, cost)| *cost)
        .collect();
    let elevated_days_after = after
        .iter()
        .filter(|cost| **cost > baseline_median * ELEVATED_MULTIPLE)
        .count();

    let explanation = AnomalyExplanation {
        service: service.to_string(),
        account_id: account_id.map(str::to_string),
        anomaly_date,
        anomaly_cost,
        has_baseline,
        baseline_days,
        baseline_median,
        baseline_min,
        baseline_max,
        cost_vs_median: anomaly_cost - baseline_median,
        cost_multiple: if baseline_median == 0.0 { 0.0 } else { anomaly_cost / baseline_median },
        elevated_days_after,
        days_observed_after: after.len(),
        is_ongoing: elevated_days_after > 0,
        daily_costs: by_day.into_iter().collect(),
    };
    info!(
        group = %group,
        date = %anomaly_date,
        multiple = explanation.cost_multiple,
        ongoing = explanation.is_ongoing,
        "Explained anomaly"
    );
    Ok(explanation)
}
