use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

use super::{AggregateQuery, AggregateReader, DailyCostRow, DailyCostSummary, DataSource};
use crate::errors::StoreError;

/// In-memory daily cost summary, persisted as a JSON snapshot between runs.
#[derive(Debug, Clone, Default)]
pub struct CostStore {
    rows: Vec<DailyCostSummary>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    rows: Vec<DailyCostSummary>,
}

impl CostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<DailyCostSummary>) -> Self {
        Self { rows }
    }

    /// Loads a snapshot. A missing file is an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No cost snapshot at {}, starting empty", path_str);
                return Ok(Self::new());
            }
            Err(source) => return Err(StoreError::Read { path: path_str, source }),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path: path_str.clone(), source })?;

        info!(
            path = %path_str,
            rows = snapshot.rows.len(),
            saved_at = %snapshot.saved_at,
            "Loaded daily cost summary"
        );
        Ok(Self { rows: snapshot.rows })
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write { path: path_str.clone(), source })?;
        }

        let snapshot = Snapshot {
            saved_at: Utc::now(),
            rows: self.rows.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|source| StoreError::Corrupt { path: path_str.clone(), source })?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| StoreError::Write { path: path_str.clone(), source })?;

        info!(path = %path_str, rows = self.rows.len(), "Saved daily cost summary");
        Ok(())
    }

    /// Swaps in freshly summarised rows for `source`. Existing rows of the same
    /// source on any day the new batch covers are dropped first, so loading the
    /// same file twice leaves the store unchanged.
    pub fn replace_rows(&mut self, source: DataSource, rows: Vec<DailyCostSummary>) -> usize {
        let days: BTreeSet<NaiveDate> = rows.iter().map(|r| r.usage_date).collect();
        let before = self.rows.len();
        self.rows
            .retain(|r| !(r.data_source == source && days.contains(&r.usage_date)));
        let replaced = before - self.rows.len();
        let added = rows.len();
        self.rows.extend(rows);

        debug!(source = %source, replaced, added, days = days.len(), "Replaced summary rows");
        added
    }

    pub fn rows(&self) -> &[DailyCostSummary] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest and latest usage dates held.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.usage_date).min()?;
        let max = self.rows.iter().map(|r| r.usage_date).max()?;
        Some((min, max))
    }
}

impl AggregateReader for CostStore {
    fn daily_costs(&self, query: &AggregateQuery<'_>) -> Result<Vec<DailyCostRow>, StoreError> {
        let dimensions = query.group_by.dimensions();
        let mut sums: HashMap<(Vec<Option<String>>, NaiveDate), f64> = HashMap::new();

        for row in self.rows.iter().filter(|r| {
            r.usage_date >= query.start
                && r.usage_date <= query.end
                && query.data_source.map_or(true, |s| s == r.data_source)
        }) {
            let key: Vec<Option<String>> = dimensions
                .iter()
                .map(|d| row.dimension_value(*d).map(str::to_string))
                .collect();
            *sums.entry((key, row.usage_date)).or_insert(0.0) += row.total_unblended_cost;
        }

        Ok(sums
            .into_iter()
            .map(|((dimension_values, usage_date), daily_cost)| DailyCostRow {
                dimension_values,
                usage_date,
                daily_cost,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dimension::GroupBy;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn row(d: u32, account: &str, service: &str, source: DataSource, cost: f64) -> DailyCostSummary {
        DailyCostSummary {
            usage_date: day(d),
            usage_account_id: Some(account.into()),
            product_code: Some(service.into()),
            region: Some("us-east-1".into()),
            data_source: source,
            total_unblended_cost: cost,
            total_blended_cost: cost,
            total_usage_amount: 1.0,
            line_item_count: 1,
        }
    }

    #[test]
    fn test_sums_per_group_and_day() {
        let store = CostStore::from_rows(vec![
            row(1, "111", "AmazonEC2", DataSource::Cur, 10.0),
            row(1, "222", "AmazonEC2", DataSource::Cur, 5.0),
            row(2, "111", "AmazonEC2", DataSource::Cur, 7.0),
            row(1, "111", "AmazonS3", DataSource::Cur, 1.0),
        ]);
        let group_by = GroupBy::default();
        let mut rows = store
            .daily_costs(&AggregateQuery { start: day(1), end: day(2), group_by: &group_by, data_source: None })
            .unwrap();
        rows.sort_by(|a, b| (a.usage_date, &a.dimension_values).cmp(&(b.usage_date, &b.dimension_values)));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].dimension_values, vec![Some("AmazonEC2".to_string())]);
        assert_eq!(rows[0].daily_cost, 15.0);
        assert_eq!(rows[2].daily_cost, 7.0);
    }

    #[test]
    fn test_window_is_inclusive_and_source_filtered() {
        let store = CostStore::from_rows(vec![
            row(1, "111", "AmazonEC2", DataSource::Cur, 1.0),
            row(3, "111", "AmazonEC2", DataSource::Cur, 3.0),
            row(3, "111", "AmazonEC2", DataSource::CostExplorer, 30.0),
            row(4, "111", "AmazonEC2", DataSource::Cur, 4.0),
        ]);
        let group_by = GroupBy::default();
        let rows = store
            .daily_costs(&AggregateQuery {
                start: day(1),
                end: day(3),
                group_by: &group_by,
                data_source: Some(DataSource::Cur),
            })
            .unwrap();
        let total: f64 = rows.iter().map(|r| r.daily_cost).sum();
        assert_eq!(total, 4.0);
    }

    #[test]
    fn test_replace_rows_is_idempotent() {
        let mut store = CostStore::new();
        let batch = vec![row(1, "111", "AmazonEC2", DataSource::Cur, 1.0), row(2, "111", "AmazonEC2", DataSource::Cur, 2.0)];
        store.replace_rows(DataSource::Cur, batch.clone());
        store.replace_rows(DataSource::CostExplorer, vec![row(1, "111", "AmazonEC2", DataSource::CostExplorer, 9.0)]);
        store.replace_rows(DataSource::Cur, batch);
        assert_eq!(store.len(), 3);
        assert_eq!(store.date_bounds(), Some((day(1), day(2))));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daily_costs.json");

        let empty = CostStore::load(&path).await.unwrap();
        assert!(empty.is_empty());

        let store = CostStore::from_rows(vec![row(1, "111", "AmazonEC2", DataSource::Cur, 12.5)]);
        store.save(&path).await.unwrap();
        let loaded = CostStore::load(&path).await.unwrap();
        assert_eq!(loaded.rows(), store.rows());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_costs.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = CostStore::load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref path, .. } if path.ends_with("daily_costs.json")));
    }
}
