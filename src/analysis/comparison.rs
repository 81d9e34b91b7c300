//! Period-over-period comparison of costs grouped by one dimension.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::dimension::{Dimension, GroupBy};
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::{AggregateQuery, AggregateReader, DataSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodChange {
    pub group_value: String,
    pub period_a_cost: f64,
    pub period_b_cost: f64,
    pub absolute_change: f64,
    /// Absent when the group cost nothing in period A.
    pub pct_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodComparison {
    pub dimension: Dimension,
    pub period_a: (NaiveDate, NaiveDate),
    pub period_b: (NaiveDate, NaiveDate),
    pub period_a_total: f64,
    pub period_b_total: f64,
    /// Groups present in both periods, largest absolute change first.
    pub movers: Vec<PeriodChange>,
    pub new_in_b: Vec<PeriodChange>,
    pub disappeared_from_a: Vec<PeriodChange>,
}

/// Inclusive date range, checked on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(label: &'static str, start: NaiveDate, end: NaiveDate) -> CostAnomalyResult<Self> {
        if start > end {
            return Err(CostAnomalyError::InvalidPeriod { label, start, end });
        }
        Ok(Self { start, end })
    }
}

fn period_totals<R: AggregateReader>(
    reader: &R,
    period: Period,
    group_by: &GroupBy,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<BTreeMap<String, f64>> {
    let rows = reader
        .daily_costs(&AggregateQuery {
            start: period.start,
            end: period.end,
            group_by,
            data_source,
        })
        .map_err(CostAnomalyError::Store)?;

    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(GroupBy::group_value(&row.dimension_values)).or_insert(0.0) += row.daily_cost;
    }
    Ok(totals)
}

/// Compares total cost per group between two periods.
///
/// Groups absent from A land in `new_in_b`, groups absent from B in
/// `disappeared_from_a`; only the `top_n` biggest movers are kept.
pub fn compare_periods<R: AggregateReader>(
    reader: &R,
    period_a: Period,
    period_b: Period,
    dimension: Dimension,
    top_n: usize,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<PeriodComparison> {
    let group_by = GroupBy::single(dimension);
    let a = period_totals(reader, period_a, &group_by, data_source)?;
    let b = period_totals(reader, period_b, &group_by, data_source)?;

    let mut groups: Vec<&String> = a.keys().chain(b.keys()).collect();
    groups.sort();
    groups.dedup();

    let mut changes: Vec<PeriodChange> = groups
        .into_iter()
        .map(|group| {
            let a_cost = a.get(group).copied().unwrap_or(0.0);
            let b_cost = b.get(group).copied().unwrap_or(0.0);
            let absolute_change = b_cost - a_cost;
            PeriodChange {
                group_value: group.clone(),
                period_a_cost: a_cost,
                period_b_cost: b_cost,
                absolute_change,
                pct_change: (a_cost != 0.0).then(|| absolute_change / a_cost * 100.0),
            }
        })
        .collect();
    changes.sort_by(|x, y| {
        y.absolute_change
            .abs()
            .total_cmp(&x.absolute_change.abs())
            .then_with(|| x.group_value.cmp(&y.group_value))
    });

    let mut comparison = PeriodComparison {
        dimension,
        period_a: (period_a.start, period_a.end),
        period_b: (period_b.start, period_b.end),
        period_a_total: a.values().sum(),
        period_b_total: b.values().sum(),
        movers: Vec::new(),
        new_in_b: Vec::new(),
        disappeared_from_a: Vec::new(),
    };
    for change in changes {
        if change.period_a_cost == 0.0 {
            comparison.new_in_b.push(change);
        } else if change.period_b_cost == 0.0 {
            comparison.disappeared_from_a.push(change);
        } else {
            comparison.movers.push(change);
        }
    }
    comparison.movers.truncate(top_n);

    info!(
        dimension = %dimension,
        movers = comparison.movers.len(),
        new = comparison.new_in_b.len(),
        disappeared = comparison.disappeared_from_a.len(),
        "Compared periods"
    );
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CostStore, DailyCostSummary};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn row(d: u32, service: &str, cost: f64) -> DailyCostSummary {
        DailyCostSummary {
            usage_date: day(d),
            usage_account_id: Some("111".into()),
            product_code: Some(service.into()),
            region: Some("us-east-1".into()),
            data_source: DataSource::Cur,
            total_unblended_cost: cost,
            total_blended_cost: cost,
            total_usage_amount: 1.0,
            line_item_count: 1,
        }
    }

    fn store() -> CostStore {
        CostStore::from_rows(vec![
            row(1, "AmazonEC2", 100.0),
            row(2, "AmazonEC2", 100.0),
            row(1, "AmazonS3", 10.0),
            row(1, "AWSLambda", 5.0),
            row(8, "AmazonEC2", 300.0),
            row(8, "AmazonS3", 8.0),
            row(9, "AmazonRDS", 50.0),
        ])
    }

    #[test]
    fn test_compare_weeks() {
        let a = Period::new("period_a", day(1), day(7)).unwrap();
        let b = Period::new("period_b", day(8), day(14)).unwrap();
        let cmp = compare_periods(&store(), a, b, Dimension::Service, 10, None).unwrap();

        assert_eq!(cmp.period_a_total, 215.0);
        assert_eq!(cmp.period_b_total, 358.0);
        assert_eq!(cmp.movers.len(), 2);
        assert_eq!(cmp.movers[0].group_value, "AmazonEC2");
        assert_eq!(cmp.movers[0].absolute_change, 100.0);
        assert_eq!(cmp.movers[0].pct_change, Some(50.0));
        assert_eq!(cmp.movers[1].group_value, "AmazonS3");
        assert_eq!(cmp.new_in_b.len(), 1);
        assert_eq!(cmp.new_in_b[0].group_value, "AmazonRDS");
        assert_eq!(cmp.new_in_b[0].pct_change, None);
        assert_eq!(cmp.disappeared_from_a[0].group_value, "AWSLambda");
    }

    #[test]
    fn test_top_n_limits_movers_only() {
        let a = Period::new("period_a", day(1), day(7)).unwrap();
        let b = Period::new("period_b", day(8), day(14)).unwrap();
        let cmp = compare_periods(&store(), a, b, Dimension::Service, 1, None).unwrap();
        assert_eq!(cmp.movers.len(), 1);
        assert_eq!(cmp.new_in_b.len(), 1);
        assert_eq!(cmp.disappeared_from_a.len(), 1);
    }

    #[test]
    fn test_inverted_period_rejected() {
        let err = Period::new("period_b", day(14), day(8)).unwrap_err();
        assert_eq!(err.to_string(), "period_b_start (2025-01-14) must be <= period_b_end (2025-01-08)");
    }
}
