use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::info;

use backfill::Backfill;
use cli::Cli;
use error::ConfigError;
use pacer::FixedInterval;
use source::HttpRateSource;
use store::{DryRunStore, PostgresStore};

mod backfill;
mod cli;
mod config;
mod currency;
mod date_window;
mod error;
mod pacer;
mod rate_record;
mod rate_snapshot;
mod source;
mod store;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let today = Utc::now().date_naive();
    let config = Cli::parse()
        .into_config(today)
        .context("Invalid configuration")?;

    let source = HttpRateSource::new(&config.api_base_url, config.request_timeout)?;
    let pacer = FixedInterval::new(config.pacing_delay);

    let summary = if config.dry_run {
        info!("Dry run: nothing will be written to {}", config.destination);
        Backfill::new(source, DryRunStore, pacer, config.base_currency.clone())
            .run(&config.window)
            .await
    } else {
        let credential = config
            .credential
            .as_ref()
            .ok_or(ConfigError::MissingCredential)?;
        let store = PostgresStore::connect(credential, config.destination.clone())
            .await
            .with_context(|| format!("Can't open destination table {}", config.destination))?;
        Backfill::new(source, store, pacer, config.base_currency.clone())
            .run(&config.window)
            .await
    };

    if summary.failed() > 0 {
        info!(
            "{} of {} dates were skipped; rerunning will duplicate the rows already loaded",
            summary.failed(),
            summary.attempted
        );
    }

    Ok(())
}
