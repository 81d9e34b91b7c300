use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostAnomalyError {
    #[error("group_by must be one of service, account, region (got '{name}')")]
    InvalidGrouping {
        name: String,
    },

    #[error("scan_start ({start}) must be <= scan_end ({end})")]
    Range {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("{label}_start ({start}) must be <= {label}_end ({end})")]
    InvalidPeriod {
        label: &'static str,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no cost data for {group} on {date}")]
    NoData {
        group: String,
        date: NaiveDate,
    },

    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    #[error("Ingest Error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration '{key}': {reason}")]
    InvalidConfig {
        key: String,
        reason: String,
    },

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the aggregate store. Detector and scanner pass these through untouched.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV decode failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("required column '{column}' not found in {version} file")]
    MissingColumn {
        column: &'static str,
        version: &'static str,
    },

    #[error("row {row}: invalid {field} '{value}'")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("unknown data source '{0}' (expected cur or cost_explorer)")]
    UnknownSource(String),
}

// Error context for tracking error chain
#[derive(Debug)]
pub struct ErrorContext {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source_location: &'static str,
    pub operation: String,
}

pub type CostAnomalyResult<T> = Result<T, CostAnomalyError>;

// Helper macro for context addition
#[macro_export]
macro_rules! with_context {
    ($result:expr, $operation:expr) => {
        $result.map_err(|e| {
            let context = $crate::errors::ErrorContext {
                timestamp: chrono::Utc::now(),
                source_location: std::file!(),
                operation: $operation.to_string(),
            };
            tracing::error!(
                error = %e,
                context = ?context,
                "Operation failed"
            );
            e
        })
    };
}
