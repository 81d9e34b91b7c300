use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloud_cost_anomalies::cli::{self, Cli};
use cloud_cost_anomalies::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Settings decide the default log level, so they load before the subscriber.
    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(database = %settings.database.path.display(), "Starting cost anomaly detector");

    if let Err(e) = cli::run(cli, settings).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
