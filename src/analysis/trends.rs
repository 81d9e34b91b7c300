use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::dimension::{Dimension, GroupBy};
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::{AggregateQuery, AggregateReader, DataSource};
use crate::utils::dates::{days_before, month_start, week_start};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub usage_date: NaiveDate,
    pub group_value: String,
    pub total_cost: f64,
    /// Change from the group's previous day in the window.
    pub cost_change: Option<f64>,
    /// Percent change; absent when the previous day cost nothing.
    pub pct_change: Option<f64>,
}

/// Day-by-day costs for the `top_n` most expensive groups of `dimension`
/// over `[reference_date - days, reference_date]`, sorted by date then group.
pub fn daily_trends<R: AggregateReader>(
    reader: &R,
    reference_date: NaiveDate,
    days: u32,
    dimension: Dimension,
    top_n: usize,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<Vec<TrendRow>> {
    let group_by = GroupBy::single(dimension);
    let rows = reader
        .daily_costs(&AggregateQuery {
            start: days_before(reference_date, days),
            end: reference_date,
            group_by: &group_by,
            data_source,
        })
        .map_err(CostAnomalyError::Store)?;

    let mut per_group: HashMap<String, BTreeMap<NaiveDate, f64>> = HashMap::new();
    for row in rows {
        *per_group
            .entry(GroupBy::group_value(&row.dimension_values))
            .or_default()
            .entry(row.usage_date)
            .or_insert(0.0) += row.daily_cost;
    }

    let mut totals: Vec<(String, f64)> = per_group
        .iter()
        .map(|(group, series)| (group.clone(), series.values().sum()))
        .collect();
    totals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals.truncate(top_n);

    let mut trends = Vec::new();
    for (group, _) in &totals {
        let Some(series) = per_group.get(group) else { continue };
        let mut previous: Option<f64> = None;
        for (date, cost) in series {
            let cost_change = previous.map(|prev| cost - prev);
            let pct_change = previous
                .filter(|prev| *prev > 0.0)
                .map(|prev| (cost - prev) / prev * 100.0);
            trends.push(TrendRow {
                usage_date: *date,
                group_value: group.clone(),
                total_cost: *cost,
                cost_change,
                pct_change,
            });
            previous = Some(*cost);
        }
    }
    trends.sort_by(|a, b| a.usage_date.cmp(&b.usage_date).then_with(|| a.group_value.cmp(&b.group_value)));

    info!(dimension = %dimension, groups = totals.len(), rows = trends.len(), "Computed daily trends");
    Ok(trends)
}

/// Total cost per day across every dimension.
pub fn total_daily_costs<R: AggregateReader>(
    reader: &R,
    reference_date: NaiveDate,
    days: u32,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<Vec<(NaiveDate, f64)>> {
    // Any single dimension partitions the rows; summing over it gives the day total.
    let group_by = GroupBy::single(Dimension::Service);
    let rows = reader
        .daily_costs(&AggregateQuery {
            start: days_before(reference_date, days),
            end: reference_date,
            group_by: &group_by,
            data_source,
        })
        .map_err(CostAnomalyError::Store)?;

    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        *per_day.entry(row.usage_date).or_insert(0.0) += row.daily_cost;
    }
    Ok(per_day.into_iter().collect())
}

/// Bucket size for `cost_trend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
    /// Weeks start on Monday.
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    /// First day of the bucket `d` falls in.
    pub fn bucket(&self, d: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => d,
            Granularity::Weekly => week_start(d),
            Granularity::Monthly => month_start(d),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            other => Err(format!("granularity must be one of daily, weekly, monthly (got '{other}')")),
        }
    }
}

/// What one `cost_trend` series covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrendScope {
    /// Everything summed into one series.
    Total,
    /// One series per value of the dimension.
    PerGroup(Dimension),
    /// Only rows whose dimension equals `value`.
    Single { dimension: Dimension, value: String },
}

impl TrendScope {
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            TrendScope::Total => None,
            TrendScope::PerGroup(dimension) | TrendScope::Single { dimension, .. } => Some(*dimension),
        }
    }

    pub fn filter_value(&self) -> Option<&str> {
        match self {
            TrendScope::Single { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTrendPoint {
    /// First day of the bucket.
    pub usage_date: NaiveDate,
    pub cost: f64,
    /// `None` for a total series.
    pub group_value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostTrendResult {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub granularity: Granularity,
    pub group_by: Option<Dimension>,
    pub filter_value: Option<String>,
    pub points: Vec<CostTrendPoint>,
    pub total: f64,
    pub average: f64,
    pub min_cost: f64,
    pub max_cost: f64,
}

/// Cost over `[date_start, date_end]` bucketed by `granularity`, with summary
/// statistics over the resulting points. An empty range yields zeros.
pub fn cost_trend<R: AggregateReader>(
    reader: &R,
    date_start: NaiveDate,
    date_end: NaiveDate,
    scope: &TrendScope,
    granularity: Granularity,
    data_source: Option<DataSource>,
) -> CostAnomalyResult<CostTrendResult> {
    if date_start > date_end {
        return Err(CostAnomalyError::InvalidPeriod { label: "date", start: date_start, end: date_end });
    }

    let group_by = GroupBy::single(scope.dimension().unwrap_or(Dimension::Service));
    let rows = reader
        .daily_costs(&AggregateQuery {
            start: date_start,
            end: date_end,
            group_by: &group_by,
            data_source,
        })
        .map_err(CostAnomalyError::Store)?;

    let mut buckets: BTreeMap<(NaiveDate, Option<String>), f64> = BTreeMap::new();
    for row in rows {
        let value = GroupBy::group_value(&row.dimension_values);
        let group = match scope {
            TrendScope::Total => None,
            TrendScope::PerGroup(_) => Some(value),
            TrendScope::Single { value: wanted, .. } if *wanted == value => Some(value),
            TrendScope::Single { .. } => continue,
        };
        *buckets.entry((granularity.bucket(row.usage_date), group)).or_insert(0.0) += row.daily_cost;
    }

    let points: Vec<CostTrendPoint> = buckets
        .into_iter()
        .map(|((usage_date, group_value), cost)| CostTrendPoint { usage_date, cost, group_value })
        .collect();

    let total: f64 = points.iter().map(|p| p.cost).sum();
    let (average, min_cost, max_cost) = if points.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            total / points.len() as f64,
            points.iter().map(|p| p.cost).fold(f64::INFINITY, f64::min),
            points.iter().map(|p| p.cost).fold(f64::NEG_INFINITY, f64::max),
        )
    };

    info!(granularity = %granularity, points = points.len(), "Computed cost trend");
    Ok(CostTrendResult {
        date_start,
        date_end,
        granularity,
        group_by: scope.dimension(),
        filter_value: scope.filter_value().map(str::to_string),
        points,
        total,
        average,
        min_cost,
        max_cost,
    })
}
