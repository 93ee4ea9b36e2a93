//! Error types for the backfill.
//!
//! [`FetchError`], [`ParseError`] and [`AppendError`] are per-date failures:
//! the driver logs them and moves on to the next date. [`ConfigError`] is
//! raised while assembling the configuration and aborts the run before the
//! first request is made.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain a response body from the rate API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e)
        }
    }
}

/// The response body could not be turned into a rate snapshot.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid snapshot date {0:?}")]
    Date(String),

    #[error("invalid currency code {0:?}")]
    CurrencyCode(String),

    #[error("invalid rate {rate} for {code}")]
    Rate { code: String, rate: f64 },

    #[error("snapshot contains no rates")]
    EmptyRates,

    /// Two keys normalise to the same code, e.g. `eur` and `EUR`.
    #[error("duplicate currency code {0}")]
    DuplicateCode(String),
}

/// The destination store did not accept a batch.
#[derive(Error, Debug)]
pub enum AppendError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Invalid configuration, detected once at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid currency code {0:?}, expected three ASCII letters")]
    CurrencyCode(String),

    #[error("invalid table identifier {0:?}, expected database.schema.table")]
    TableId(String),

    #[error("destination database {expected:?} does not match connected database {actual:?}")]
    DatabaseMismatch { expected: String, actual: String },

    #[error("backfill window of {days} days ending {end} is out of range")]
    Window { days: u64, end: chrono::NaiveDate },

    #[error("start date {start} is after end date {end}")]
    InvertedWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("no database credential given (set DATABASE_URL or use --dry-run)")]
    MissingCredential,

    #[error("invalid API base URL {0:?}")]
    ApiUrl(String),

    #[error("can't build HTTP client: {0}")]
    HttpClient(String),
}
