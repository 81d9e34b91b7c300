pub mod analysis;
pub mod billing;
pub mod cli;
pub mod config;
pub mod errors;
pub mod ingestion;
pub mod storage;
pub mod utils;

// Re-exports
pub use analysis::{
    scan_anomalies, Anomaly, AnomalyDetector, AnomalyKind, DetectParams, Dimension, GroupBy,
    ScanResult, Sensitivity, Severity,
};
pub use billing::BillingLedger;
pub use errors::{CostAnomalyError, CostAnomalyResult};
pub use storage::{AggregateReader, CostStore, DataSource};
