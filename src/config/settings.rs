/*
* Cost Anomalies Configuration
* ----------------------------
*
* Configuration Hierarchy (from lowest to highest priority):
* -----------------------------------------------------
* 1. Hardcoded defaults (what you get with an empty directory)
* 2. <CONFIG_PATH>/default.toml (written by `cost-anomalies init`)
* 3. <CONFIG_PATH>/local.toml (per-machine overrides, keep it out of git)
* 4. --config <file> (explicit file wins over both of the above)
* 5. Environment variables, COST_ prefix, `__` between section and key
*    e.g. COST_ANOMALY__MIN_DAILY_COST=5
*
* Sections:
* --------
* database.path              - where the daily cost snapshot lives
* anomaly.rolling_window_days - history before the reference day
* anomaly.sensitivity        - low | medium | high
* anomaly.min_daily_cost     - groups cheaper than this are noise
* anomaly.drift_threshold_pct - total drift over the window, in percent
* anomaly.group_by           - service, account, region or a `+` combination
* logging.level              - default tracing filter when RUST_LOG is unset
*
* Everything is validated after loading. A typo in sensitivity fails here,
* not three commands later.
*/

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::{DetectParams, GroupBy, Sensitivity};
use crate::errors::{CostAnomalyError, CostAnomalyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub anomaly: AnomalySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalySettings {
    pub rolling_window_days: u32,
    pub sensitivity: String,
    pub min_daily_cost: f64,
    pub drift_threshold_pct: f64,
    pub group_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Settings {
    pub fn new() -> CostAnomalyResult<Self> {
        Self::load(None)
    }

    pub fn load(explicit: Option<&Path>) -> CostAnomalyResult<Self> {
        let config_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config".to_string());

        debug!("Loading configuration from path: {}", config_path);

        let defaults = generate_default_config();
        let mut builder = Config::builder()
            // Start with default settings
            .set_default("database.path", defaults.database.path.display().to_string())?
            .set_default("anomaly.rolling_window_days", i64::from(defaults.anomaly.rolling_window_days))?
            .set_default("anomaly.sensitivity", defaults.anomaly.sensitivity)?
            .set_default("anomaly.min_daily_cost", defaults.anomaly.min_daily_cost)?
            .set_default("anomaly.drift_threshold_pct", defaults.anomaly.drift_threshold_pct)?
            .set_default("anomaly.group_by", defaults.anomaly.group_by)?
            .set_default("logging.level", defaults.logging.level)?

            // Add configuration from files
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false));

        if let Some(path) = explicit {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            // Add environment variables with prefix "COST_"
            .add_source(
                Environment::with_prefix("COST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> CostAnomalyResult<()> {
        let invalid = |key: &str, reason: String| CostAnomalyError::InvalidConfig {
            key: key.to_string(),
            reason,
        };

        if self.anomaly.rolling_window_days < 1 {
            return Err(invalid("anomaly.rolling_window_days", "must be >= 1".into()));
        }
        if !(self.anomaly.min_daily_cost >= 0.0) {
            return Err(invalid(
                "anomaly.min_daily_cost",
                format!("must be >= 0, got {}", self.anomaly.min_daily_cost),
            ));
        }
        if !(self.anomaly.drift_threshold_pct > 0.0) {
            return Err(invalid(
                "anomaly.drift_threshold_pct",
                format!("must be > 0, got {}", self.anomaly.drift_threshold_pct),
            ));
        }
        self.sensitivity()
            .map_err(|reason| invalid("anomaly.sensitivity", reason))?;
        self.group_by()
            .map_err(|e| invalid("anomaly.group_by", e.to_string()))?;
        Ok(())
    }

    pub fn sensitivity(&self) -> Result<Sensitivity, String> {
        self.anomaly.sensitivity.parse()
    }

    pub fn group_by(&self) -> CostAnomalyResult<GroupBy> {
        self.anomaly.group_by.parse()
    }

    /// Detection parameters as configured, reference date left to the caller.
    pub fn detect_params(&self) -> CostAnomalyResult<DetectParams> {
        Ok(DetectParams {
            window_days: self.anomaly.rolling_window_days,
            group_by: self.group_by()?,
            sensitivity: Sensitivity::from_name_lossy(&self.anomaly.sensitivity),
            min_daily_cost: self.anomaly.min_daily_cost,
            drift_threshold: self.anomaly.drift_threshold_pct / 100.0,
            data_source: None,
            reference_date: None,
        })
    }
}

pub fn generate_default_config() -> Settings {
    Settings {
        database: DatabaseSettings {
            path: PathBuf::from("./data/daily_costs.json"),
        },
        anomaly: AnomalySettings {
            rolling_window_days: 14,
            sensitivity: "medium".to_string(),
            min_daily_cost: 1.0,
            drift_threshold_pct: 20.0,
            group_by: "service".to_string(),
        },
        logging: LoggingSettings {
            level: "info".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = generate_default_config();
        assert!(settings.validate().is_ok());
        let params = settings.detect_params().unwrap();
        assert_eq!(params.window_days, 14);
        assert_eq!(params.sensitivity, Sensitivity::Medium);
        assert!((params.drift_threshold - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_sensitivity() {
        let mut settings = generate_default_config();
        settings.anomaly.sensitivity = "paranoid".into();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, CostAnomalyError::InvalidConfig { ref key, .. } if key == "anomaly.sensitivity"));
    }

    #[test]
    fn test_rejects_bad_group_by() {
        let mut settings = generate_default_config();
        settings.anomaly.group_by = "service+team".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_min_cost_and_zero_window() {
        let mut settings = generate_default_config();
        settings.anomaly.min_daily_cost = -1.0;
        assert!(settings.validate().is_err());

        let mut settings = generate_default_config();
        settings.anomaly.rolling_window_days = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&generate_default_config()).unwrap();
        assert!(text.contains("[anomaly]"));
        assert!(text.contains("rolling_window_days = 14"));
    }

    #[test]
    fn test_env_override_uses_single_underscore_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("CONFIG_PATH", dir.path());
        std::env::set_var("COST_ANOMALY__MIN_DAILY_COST", "5");
        std::env::set_var("COST_ANOMALY__GROUP_BY", "service+account");

        let loaded = Settings::load(None);

        std::env::remove_var("COST_ANOMALY__MIN_DAILY_COST");
        std::env::remove_var("COST_ANOMALY__GROUP_BY");
        std::env::remove_var("CONFIG_PATH");

        let settings = loaded.unwrap();
        assert_eq!(settings.anomaly.min_daily_cost, 5.0);
        assert_eq!(settings.anomaly.group_by, "service+account");
        assert_eq!(settings.anomaly.rolling_window_days, 14);
    }
}
