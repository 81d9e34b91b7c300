use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::storage::{DailyCostSummary, DataSource};

/// Line item types that are not usage and never count toward daily cost.
pub const EXCLUDED_LINE_ITEM_TYPES: [&str; 5] = ["Tax", "Fee", "Credit", "Refund", "BundledDiscount"];

/// One billing record as it arrives from a cost and usage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingLineItem {
    pub line_item_id: Option<String>,
    pub usage_start: NaiveDateTime,
    pub usage_account_id: Option<String>,
    pub product_code: Option<String>,
    pub region: Option<String>,
    pub usage_type: Option<String>,
    pub line_item_type: String,
    pub unblended_cost: f64,
    pub blended_cost: f64,
    pub usage_amount: f64,
    pub currency_code: Option<String>,
}

impl BillingLineItem {
    pub fn usage_date(&self) -> NaiveDate {
        self.usage_start.date()
    }

    pub fn is_usage(&self) -> bool {
        !EXCLUDED_LINE_ITEM_TYPES.contains(&self.line_item_type.as_str())
    }
}

/// Collects line items from one source and rolls them up into daily summary rows.
#[derive(Debug, Clone)]
pub struct BillingLedger {
    source: DataSource,
    line_items: Vec<BillingLineItem>,
}

type SummaryKey = (NaiveDate, Option<String>, Option<String>, Option<String>);

impl BillingLedger {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            line_items: Vec::new(),
        }
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn add_line_item(&mut self, line_item: BillingLineItem) {
        self.line_items.push(line_item);
    }

    pub fn extend(&mut self, line_items: impl IntoIterator<Item = BillingLineItem>) {
        self.line_items.extend(line_items);
    }

    pub fn len(&self) -> usize {
        self.line_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Sum of usage cost across all line items, excluded types left out.
    pub fn total_usage_cost(&self) -> f64 {
        self.line_items
            .iter()
            .filter(|item| item.is_usage())
            .map(|item| item.unblended_cost)
            .sum()
    }

    /// One summary row per (usage day, account, service, region).
    pub fn rebuild_daily_summary(&self) -> Vec<DailyCostSummary> {
        let mut grouped: BTreeMap<SummaryKey, DailyCostSummary> = BTreeMap::new();
        let mut excluded = 0usize;

        for item in &self.line_items {
            if !item.is_usage() {
                excluded += 1;
                continue;
            }
            let key = (
                item.usage_date(),
                item.usage_account_id.clone(),
                item.product_code.clone(),
                item.region.clone(),
            );
            let summary = grouped.entry(key).or_insert_with(|| DailyCostSummary {
                usage_date: item.usage_date(),
                usage_account_id: item.usage_account_id.clone(),
                product_code: item.product_code.clone(),
                region: item.region.clone(),
                data_source: self.source,
                total_unblended_cost: 0.0,
                total_blended_cost: 0.0,
                total_usage_amount: 0.0,
                line_item_count: 0,
            });
            summary.total_unblended_cost += item.unblended_cost;
            summary.total_blended_cost += item.blended_cost;
            summary.total_usage_amount += item.usage_amount;
            summary.line_item_count += 1;
        }

        debug!(
            source = %self.source,
            line_items = self.line_items.len(),
            excluded,
            rows = grouped.len(),
            "Rebuilt daily summary"
        );
        grouped.into_values().collect()
    }
}
