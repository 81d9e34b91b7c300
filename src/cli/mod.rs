/*
* Cost Anomalies Command Line Interface
* -------------------------------------
*
* Command Structure:
* ---------------
* cost-anomalies [--config <file>]
* ├── ingest     --file <csv> [--source cur|cost_explorer]
* ├── anomalies  [--days] [--sensitivity] [--group-by] [--drift-threshold] [--source] [--date] [--json]
* ├── scan       --start <date> --end <date> + everything anomalies takes except --date
* ├── trends     [--days] [--group-by] [--top] [--source] [--json]
* ├── costs      --start <date> --end <date> [--granularity] [--group-by] [--filter] [--json]
* ├── compare    --a-start --a-end --b-start --b-end [--group-by] [--top] [--json]
* ├── explain    --service <code> --date <date> [--account] [--baseline-days] [--json]
* └── init       [--force]
*
* The detector itself lives in `crate::analysis`. This module only turns
* flags and config into parameters and results into tables or JSON.
*
* Usage Examples:
* -------------
* ```bash
* cost-anomalies ingest --file cur-2025-01.csv
* cost-anomalies anomalies --group-by service+account --sensitivity high
* cost-anomalies scan --start 2025-01-01 --end 2025-01-31 --json
* ```
*/

pub mod formatting;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{error, info};

use crate::analysis::{
    compare_periods, cost_trend, daily_trends, explain_anomaly, scan_anomalies, AnomalyDetector, DetectParams,
    Dimension, Granularity, GroupBy, Period, Sensitivity, TrendScope,
};
use crate::config::{generate_default_config, Settings};
use crate::ingestion::ingest_file;
use crate::storage::{CostStore, DataSource};
use crate::with_context;

use formatting::{
    format_currency, print_anomalies_table, print_comparison, print_cost_trend, print_explanation, print_trends_table,
};

#[derive(Parser)]
#[command(name = "cost-anomalies")]
#[command(about = "Detect unusual cloud cost behaviour", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a CUR CSV export into the daily cost summary
    Ingest {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, default_value = "cur")]
        source: DataSource,
    },
    /// Detect cost anomalies as of one day
    Anomalies {
        #[command(flatten)]
        detect: DetectArgs,
        /// Reference day, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Detect anomalies on every day of a range, one event per streak
    Scan {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[command(flatten)]
        detect: DetectArgs,
    },
    /// Show day-over-day cost changes for the biggest groups
    Trends {
        #[arg(short, long, default_value_t = 14)]
        days: u32,
        #[arg(short, long, default_value = "service")]
        group_by: Dimension,
        #[arg(short, long, default_value_t = 10)]
        top: usize,
        #[arg(short, long)]
        source: Option<DataSource>,
        #[arg(long)]
        json: bool,
    },
    /// Cost over a date range, bucketed by day, week or month
    Costs {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "daily")]
        granularity: Granularity,
        /// Split the series by service, account or region
        #[arg(short, long)]
        group_by: Option<Dimension>,
        /// Keep only this value of --group-by
        #[arg(short, long, requires = "group_by")]
        filter: Option<String>,
        #[arg(short, long)]
        source: Option<DataSource>,
        #[arg(long)]
        json: bool,
    },
    /// Compare cost per group between two periods
    Compare {
        #[arg(long)]
        a_start: NaiveDate,
        #[arg(long)]
        a_end: NaiveDate,
        #[arg(long)]
        b_start: NaiveDate,
        #[arg(long)]
        b_end: NaiveDate,
        #[arg(short, long, default_value = "service")]
        group_by: Dimension,
        #[arg(short, long, default_value_t = 10)]
        top: usize,
        #[arg(short, long)]
        source: Option<DataSource>,
        #[arg(long)]
        json: bool,
    },
    /// Put one day's cost for a service in context
    Explain {
        #[arg(long)]
        service: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        account: Option<String>,
        #[arg(long, default_value_t = 14)]
        baseline_days: u32,
        #[arg(short, long)]
        source: Option<DataSource>,
        #[arg(long)]
        json: bool,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Rolling window size in days
    #[arg(short, long)]
    pub days: Option<u32>,
    /// low, medium or high
    #[arg(long)]
    pub sensitivity: Option<Sensitivity>,
    /// service, account, region or a `+` combination such as service+account
    #[arg(short, long)]
    pub group_by: Option<GroupBy>,
    /// Drift threshold in percent
    #[arg(long)]
    pub drift_threshold: Option<f64>,
    #[arg(short, long)]
    pub source: Option<DataSource>,
    #[arg(long)]
    pub json: bool,
}

impl DetectArgs {
    /// Flags override config.
    fn params(&self, settings: &Settings) -> anyhow::Result<DetectParams> {
        let mut params = settings.detect_params()?;
        if let Some(days) = self.days {
            if days == 0 {
                return Err(anyhow!("--days must be >= 1"));
            }
            params.window_days = days;
        }
        if let Some(sensitivity) = self.sensitivity {
            params.sensitivity = sensitivity;
        }
        if let Some(group_by) = &self.group_by {
            params.group_by = group_by.clone();
        }
        if let Some(pct) = self.drift_threshold {
            if pct <= 0.0 {
                return Err(anyhow!("--drift-threshold must be > 0"));
            }
            params.drift_threshold = pct / 100.0;
        }
        params.data_source = self.source;
        Ok(params)
    }
}

pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ingest { file, source } => handle_ingest(&settings, file, source).await?,
        Commands::Anomalies { detect, date } => handle_anomalies(&settings, &detect, date).await?,
        Commands::Scan { start, end, detect } => handle_scan(&settings, &detect, start, end).await?,
        Commands::Trends { days, group_by, top, source, json } => {
            handle_trends(&settings, days, group_by, top, source, json).await?
        }
        Commands::Costs { start, end, granularity, group_by, filter, source, json } => {
            let scope = match (group_by, filter) {
                (None, _) => TrendScope::Total,
                (Some(dimension), None) => TrendScope::PerGroup(dimension),
                (Some(dimension), Some(value)) => TrendScope::Single { dimension, value },
            };
            handle_costs(&settings, start, end, &scope, granularity, source, json).await?
        }
        Commands::Compare { a_start, a_end, b_start, b_end, group_by, top, source, json } => {
            let period_a = Period::new("period_a", a_start, a_end)?;
            let period_b = Period::new("period_b", b_start, b_end)?;
            handle_compare(&settings, period_a, period_b, group_by, top, source, json).await?
        }
        Commands::Explain { service, date, account, baseline_days, source, json } => {
            handle_explain(&settings, &service, date, account.as_deref(), baseline_days, source, json).await?
        }
        Commands::Init { force } => handle_init_command(force)?,
    }

    Ok(())
}

async fn load_store(settings: &Settings) -> anyhow::Result<CostStore> {
    let store = CostStore::load(&settings.database.path)
        .await
        .with_context(|| format!("failed to open {}", settings.database.path.display()))?;
    if store.is_empty() {
        println!(
            "{} Run {} first to load CUR data.",
            "No cost data found.".yellow(),
            "ingest".bold()
        );
        return Err(anyhow!("no cost data in {}", settings.database.path.display()));
    }
    Ok(store)
}

fn print_settings_footer(params: &DetectParams) {
    let footer = format!(
        "Settings: {}-day window, sensitivity={} (z>{}), drift threshold={:.0}%, min cost={}/day, group-by={}",
        params.window_days,
        params.sensitivity,
        params.sensitivity.threshold(),
        params.drift_threshold * 100.0,
        format_currency(Some(params.min_daily_cost)),
        params.group_by,
    );
    println!("\n{}", footer.dimmed());
}

async fn handle_ingest(settings: &Settings, file: PathBuf, source: DataSource) -> anyhow::Result<()> {
    let mut store = CostStore::load(&settings.database.path).await?;
    let report = with_context!(ingest_file(&mut store, &file, source).await, "ingest billing file")?;
    store.save(&settings.database.path).await?;

    println!(
        "{} Loaded {} line items from {} into {} daily rows ({} usage cost)",
        "✓".green(),
        report.line_items,
        report.file,
        report.summary_rows,
        format_currency(Some(report.total_usage_cost)),
    );
    if !report.billing_periods.is_empty() {
        println!("  Billing periods: {}", report.billing_periods.join(", "));
    }
    Ok(())
}

async fn handle_anomalies(
    settings: &Settings,
    args: &DetectArgs,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let mut params = args.params(settings)?;
    params.reference_date = date;
    let store = load_store(settings).await?;

    let detector = AnomalyDetector::new(store);
    let anomalies = with_context!(detector.detect(&params), "detect anomalies")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
    } else {
        print_anomalies_table(&anomalies);
        print_settings_footer(&params);
    }
    Ok(())
}

async fn handle_scan(
    settings: &Settings,
    args: &DetectArgs,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<()> {
    let params = args.params(settings)?;
    let store = load_store(settings).await?;
    info!("Scanning {} to {}", start, end);

    // One detector call per day; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || {
        let detector = AnomalyDetector::new(store);
        scan_anomalies(&detector, start, end, &params).map(|result| (result, params))
    })
    .await
    .context("scan task panicked")?;
    let (result, params) = with_context!(result, "scan anomalies")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{}",
            format!("Scanned {} day(s): {} to {}", result.days_scanned, result.scan_start, result.scan_end).bold()
        );
        print_anomalies_table(&result.anomalies);
        print_settings_footer(&params);
    }
    Ok(())
}

async fn handle_trends(
    settings: &Settings,
    days: u32,
    group_by: Dimension,
    top: usize,
    source: Option<DataSource>,
    json: bool,
) -> anyhow::Result<()> {
    let store = load_store(settings).await?;
    let reference_date = chrono::Utc::now().date_naive();
    let trends = daily_trends(&store, reference_date, days, group_by, top, source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trends)?);
    } else {
        print_trends_table(&trends, group_by.name());
    }
    Ok(())
}

async fn handle_costs(
    settings: &Settings,
    start: NaiveDate,
    end: NaiveDate,
    scope: &TrendScope,
    granularity: Granularity,
    source: Option<DataSource>,
    json: bool,
) -> anyhow::Result<()> {
    let store = load_store(settings).await?;
    let trend = cost_trend(&store, start, end, scope, granularity, source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trend)?);
    } else {
        print_cost_trend(&trend);
    }
    Ok(())
}

async fn handle_compare(
    settings: &Settings,
    period_a: Period,
    period_b: Period,
    group_by: Dimension,
    top: usize,
    source: Option<DataSource>,
    json: bool,
) -> anyhow::Result<()> {
    let store = load_store(settings).await?;
    let comparison = with_context!(
        compare_periods(&store, period_a, period_b, group_by, top, source),
        "compare periods"
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print_comparison(&comparison);
    }
    Ok(())
}

async fn handle_explain(
    settings: &Settings,
    service: &str,
    date: NaiveDate,
    account: Option<&str>,
    baseline_days: u32,
    source: Option<DataSource>,
    json: bool,
) -> anyhow::Result<()> {
    let store = load_store(settings).await?;
    let explanation = explain_anomaly(&store, service, date, account, baseline_days, source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
    } else {
        print_explanation(&explanation);
    }
    Ok(())
}

fn handle_init_command(force: bool) -> anyhow::Result<()> {
    let config_dir = PathBuf::from(std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string()));
    if config_dir.join("default.toml").exists() && !force {
        error!("Configuration already exists. Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = generate_default_config();
    let config_str = toml::to_string_pretty(&default_config)?;
    std::fs::write(config_dir.join("default.toml"), config_str)?;

    println!("{} Default configuration generated", "✓".green());
    Ok(())
}
