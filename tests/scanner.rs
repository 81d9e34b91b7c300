use chrono::{Days, NaiveDate};
use cloud_cost_anomalies::storage::DailyCostSummary;
use cloud_cost_anomalies::{
    scan_anomalies, AnomalyDetector, AnomalyKind, CostAnomalyError, CostStore, DataSource,
    DetectParams,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

/// Flat 100/day from 2024-12-01 through 2025-01-30, with overrides.
fn store_with(overrides: &[(NaiveDate, f64)]) -> CostStore {
    let first = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
    let rows = (0..61)
        .map(|i| {
            let usage_date = first + Days::new(i);
            let cost = overrides
                .iter()
                .find(|(d, _)| *d == usage_date)
                .map_or(100.0, |(_, c)| *c);
            DailyCostSummary {
                usage_date,
                usage_account_id: Some("111111111111".into()),
                product_code: Some("AmazonEC2".into()),
                region: Some("us-east-1".into()),
                data_source: DataSource::Cur,
                total_unblended_cost: cost,
                total_blended_cost: cost,
                total_usage_amount: 1.0,
                line_item_count: 1,
            }
        })
        .collect();
    CostStore::from_rows(rows)
}

#[test]
fn test_single_spike_over_a_month() {
    let detector = AnomalyDetector::new(store_with(&[(day(20), 500.0)]));
    let result = scan_anomalies(&detector, day(1), day(30), &DetectParams::default()).unwrap();

    assert_eq!(result.days_scanned, 30);
    assert_eq!(result.scan_start, day(1));
    assert_eq!(result.scan_end, day(30));
    assert_eq!(result.anomalies.len(), 1);
    assert_eq!(result.anomalies[0].kind(), AnomalyKind::Point);
    assert_eq!(result.anomalies[0].usage_date, day(20));
    assert_eq!(result.anomalies[0].z_score(), 10.0);
}

#[test]
fn test_consecutive_days_collapse_and_keep_first_on_tie() {
    // Both days saturate at z = 10 against a flat baseline.
    let detector = AnomalyDetector::new(store_with(&[(day(20), 500.0), (day(21), 600.0)]));
    let result = scan_anomalies(&detector, day(1), day(30), &DetectParams::default()).unwrap();

    let points: Vec<_> = result
        .anomalies
        .iter()
        .filter(|a| a.kind() == AnomalyKind::Point)
        .collect();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].usage_date, day(20));
    assert_eq!(points[0].current_cost, 500.0);
}

#[test]
fn test_quiet_month() {
    let detector = AnomalyDetector::new(store_with(&[]));
    let result = scan_anomalies(&detector, day(1), day(30), &DetectParams::default()).unwrap();
    assert_eq!(result.days_scanned, 30);
    assert!(result.anomalies.is_empty());
}

#[test]
fn test_single_day_range() {
    let detector = AnomalyDetector::new(store_with(&[(day(20), 500.0)]));
    let result = scan_anomalies(&detector, day(20), day(20), &DetectParams::default()).unwrap();
    assert_eq!(result.days_scanned, 1);
    assert_eq!(result.anomalies.len(), 1);
}

#[test]
fn test_inverted_range_is_rejected() {
    let detector = AnomalyDetector::new(store_with(&[]));
    let err = scan_anomalies(&detector, day(30), day(1), &DetectParams::default()).unwrap_err();
    assert!(matches!(err, CostAnomalyError::Range { .. }));
}
