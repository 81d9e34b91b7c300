use chrono::NaiveDate;
use cloud_cost_anomalies::analysis::{daily_trends, total_daily_costs, Dimension};
use cloud_cost_anomalies::ingestion::ingest_file;
use cloud_cost_anomalies::{CostAnomalyError, CostStore, DataSource};

const CUR_V1: &str = "identity/LineItemId,lineItem/UsageAccountId,product/ProductCode,lineItem/UsageStartDate,lineItem/UnblendedCost,lineItem/BlendedCost,lineItem/LineItemType,product/region
l1,111111111111,AmazonEC2,2025-01-01T00:00:00Z,10.00,10.00,Usage,us-east-1
l2,111111111111,AmazonEC2,2025-01-01T13:00:00Z,5.00,5.00,Usage,us-east-1
l3,111111111111,AmazonS3,2025-01-01T00:00:00Z,2.50,2.50,Usage,us-east-1
l4,111111111111,AmazonEC2,2025-01-01T00:00:00Z,1.20,1.20,Tax,us-east-1
l5,111111111111,AmazonEC2,2025-01-02T00:00:00Z,20.00,20.00,Usage,us-east-1
l6,111111111111,AmazonS3,2025-01-02T00:00:00Z,2.50,2.50,Usage,us-east-1
l7,111111111111,AmazonEC2,2025-01-02T00:00:00Z,-3.00,-3.00,Credit,us-east-1
";

fn jan(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

#[tokio::test]
async fn test_ingest_save_and_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("cur.csv");
    tokio::fs::write(&csv_path, CUR_V1).await?;

    let mut store = CostStore::new();
    let report = ingest_file(&mut store, &csv_path, DataSource::Cur).await?;
    assert_eq!(report.line_items, 7);
    assert_eq!(report.summary_rows, 4);
    assert!((report.total_usage_cost - 40.0).abs() < 1e-9);
    assert_eq!(report.billing_periods, vec!["20250101-20250201".to_string()]);

    let snapshot = dir.path().join("data").join("daily_costs.json");
    store.save(&snapshot).await?;
    let reloaded = CostStore::load(&snapshot).await?;
    assert_eq!(reloaded.rows(), store.rows());
    assert_eq!(reloaded.date_bounds(), Some((jan(1), jan(2))));

    let totals = total_daily_costs(&reloaded, jan(2), 1, None)?;
    assert_eq!(totals, vec![(jan(1), 17.5), (jan(2), 22.5)]);
    Ok(())
}

#[tokio::test]
async fn test_reingest_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("cur.csv");
    tokio::fs::write(&csv_path, CUR_V1).await?;

    let mut store = CostStore::new();
    ingest_file(&mut store, &csv_path, DataSource::Cur).await?;
    let first = store.rows().to_vec();
    ingest_file(&mut store, &csv_path, DataSource::Cur).await?;
    assert_eq!(store.len(), first.len());

    // Same days from another source sit alongside, not on top.
    ingest_file(&mut store, &csv_path, DataSource::CostExplorer).await?;
    assert_eq!(store.len(), first.len() * 2);
    let cur_only = total_daily_costs(&store, jan(2), 1, Some(DataSource::Cur))?;
    assert_eq!(cur_only, vec![(jan(1), 17.5), (jan(2), 22.5)]);
    Ok(())
}

#[tokio::test]
async fn test_trends_after_ingest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("cur.csv");
    tokio::fs::write(&csv_path, CUR_V1).await?;

    let mut store = CostStore::new();
    ingest_file(&mut store, &csv_path, DataSource::Cur).await?;

    let trends = daily_trends(&store, jan(2), 1, Dimension::Service, 1, None)?;
    assert_eq!(trends.len(), 2);
    assert!(trends.iter().all(|t| t.group_value == "AmazonEC2"));
    let second = trends.iter().find(|t| t.usage_date == jan(2)).unwrap();
    assert_eq!(second.cost_change, Some(5.0));
    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CostStore::new();
    let err = ingest_file(&mut store, dir.path().join("nope.csv"), DataSource::Cur)
        .await
        .unwrap_err();
    assert!(matches!(err, CostAnomalyError::Io(_)));
    assert!(store.is_empty());
}
