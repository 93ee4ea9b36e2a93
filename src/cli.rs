//! Command-line interface.
//!
//! Every option can also be set through the environment (or a `.env` file,
//! loaded before parsing).

use std::time::Duration;

use chrono::NaiveDate;
use clap::Parser;

use crate::config::{BackfillConfig, Credential, TableId};
use crate::currency::CurrencyCode;
use crate::date_window::DateWindow;
use crate::error::ConfigError;
use crate::pacer::DEFAULT_PACING_DELAY;
use crate::source::DEFAULT_API_URL;

/// Backfill daily exchange rates into a Postgres table.
///
/// ```sh
/// rate-backfill --table warehouse.currency_data.daily_rates --days 30
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Destination table as database.schema.table
    #[arg(short, long, env = "DESTINATION_TABLE")]
    pub table: String,

    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Number of days before the end date to backfill
    #[arg(short, long, env = "BACKFILL_DAYS", default_value_t = 365)]
    pub days: u64,

    /// Last date to load, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long, env = "END_DATE")]
    pub end_date: Option<NaiveDate>,

    /// Currency the rates are quoted against
    #[arg(short, long, env = "BASE_CURRENCY", default_value = "USD")]
    pub base_currency: String,

    /// Minimum gap between API requests, in milliseconds
    #[arg(long, env = "PACING_DELAY_MS", default_value_t = DEFAULT_PACING_DELAY.as_millis() as u64)]
    pub pacing_delay_ms: u64,

    /// Rate API base URL
    #[arg(long, env = "RATES_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log the records instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Validates the arguments; `today` is used when no end date was given.
    pub fn into_config(self, today: NaiveDate) -> Result<BackfillConfig, ConfigError> {
        let base_currency: CurrencyCode = self.base_currency.parse()?;
        let destination: TableId = self.table.parse()?;
        let window = DateWindow::ending_on(self.end_date.unwrap_or(today), self.days)?;

        let credential = self.database_url.map(Credential::new);
        if credential.is_none() && !self.dry_run {
            return Err(ConfigError::MissingCredential);
        }

        Ok(BackfillConfig {
            base_currency,
            destination,
            credential,
            window,
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
            api_base_url: self.api_url,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            dry_run: self.dry_run,
        })
    }
}
