pub mod cur;

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

use crate::billing::BillingLedger;
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::{CostStore, DataSource};
use crate::utils::dates::billing_period_str;

pub use cur::{parse_cur_csv, CurVersion};

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub file: String,
    pub data_source: DataSource,
    pub line_items: usize,
    pub summary_rows: usize,
    pub total_usage_cost: f64,
    /// CUR billing periods the file touched, e.g. `20250101-20250201`.
    pub billing_periods: Vec<String>,
}

/// Loads one CUR CSV file and replaces the matching days of `source` in the store.
pub async fn ingest_file(
    store: &mut CostStore,
    path: impl AsRef<Path>,
    source: DataSource,
) -> CostAnomalyResult<IngestReport> {
    let path = path.as_ref();
    let file = path.display().to_string();
    info!(file = %file, source = %source, "Ingesting billing file");

    let bytes = tokio::fs::read(path).await.map_err(CostAnomalyError::Io)?;
    let (version, line_items) = parse_cur_csv(bytes.as_slice())?;
    if line_items.is_empty() {
        warn!(file = %file, "Billing file has no line items");
    }

    let mut ledger = BillingLedger::new(source);
    ledger.extend(line_items);
    let rows = ledger.rebuild_daily_summary();
    let billing_periods: BTreeSet<String> = rows.iter().map(|r| billing_period_str(r.usage_date)).collect();
    let summary_rows = store.replace_rows(source, rows);

    let report = IngestReport {
        file,
        data_source: source,
        line_items: ledger.len(),
        summary_rows,
        total_usage_cost: ledger.total_usage_cost(),
        billing_periods: billing_periods.into_iter().collect(),
    };
    info!(
        file = %report.file,
        version = version.as_str(),
        line_items = report.line_items,
        summary_rows = report.summary_rows,
        "Ingestion complete"
    );
    Ok(report)
}
