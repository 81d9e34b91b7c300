pub mod store;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analysis::dimension::{Dimension, GroupBy};
use crate::errors::{IngestError, StoreError};

pub use store::CostStore;

/// Where a summary row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cur,
    CostExplorer,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cur => "cur",
            DataSource::CostExplorer => "cost_explorer",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cur" => Ok(DataSource::Cur),
            "cost_explorer" | "cost-explorer" => Ok(DataSource::CostExplorer),
            other => Err(IngestError::UnknownSource(other.to_string())),
        }
    }
}

/// One row of the daily cost summary: a day's usage for one account/service/region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCostSummary {
    pub usage_date: NaiveDate,
    pub usage_account_id: Option<String>,
    pub product_code: Option<String>,
    pub region: Option<String>,
    pub data_source: DataSource,
    pub total_unblended_cost: f64,
    pub total_blended_cost: f64,
    pub total_usage_amount: f64,
    pub line_item_count: u64,
}

impl DailyCostSummary {
    pub fn dimension_value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Service => self.product_code.as_deref(),
            Dimension::Account => self.usage_account_id.as_deref(),
            Dimension::Region => self.region.as_deref(),
        }
    }
}

/// A read request against the aggregate store. Both dates are inclusive.
#[derive(Debug, Clone)]
pub struct AggregateQuery<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub group_by: &'a GroupBy,
    pub data_source: Option<DataSource>,
}

/// Summed cost for one combination of group-by values on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCostRow {
    /// One entry per group-by dimension, in group-by order.
    pub dimension_values: Vec<Option<String>>,
    pub usage_date: NaiveDate,
    pub daily_cost: f64,
}

/// Read side of the daily aggregate store.
///
/// Implementations return at most one row per (group combination, date) and
/// make no promise about row order.
pub trait AggregateReader {
    fn daily_costs(&self, query: &AggregateQuery<'_>) -> Result<Vec<DailyCostRow>, StoreError>;
}

impl<R: AggregateReader + ?Sized> AggregateReader for &R {
    fn daily_costs(&self, query: &AggregateQuery<'_>) -> Result<Vec<DailyCostRow>, StoreError> {
        (**self).daily_costs(query)
    }
}
