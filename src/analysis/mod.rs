pub mod anomaly;
pub mod comparison;
pub mod detector;
pub mod dimension;
pub mod explainer;
pub mod scanner;
pub mod stats;
pub mod trends;

pub use anomaly::{Anomaly, AnomalyKind, Direction, DriftFraction, Severity, Signal, ZScore};
pub use comparison::{compare_periods, Period, PeriodChange, PeriodComparison};
pub use detector::{AnomalyDetector, DetectParams, Sensitivity};
pub use dimension::{Dimension, GroupBy};
pub use explainer::{explain_anomaly, AnomalyExplanation};
pub use scanner::{scan_anomalies, ScanResult};
pub use trends::{
    cost_trend, daily_trends, total_daily_costs, CostTrendPoint, CostTrendResult, Granularity, TrendRow, TrendScope,
};
