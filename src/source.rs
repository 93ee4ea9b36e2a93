use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, ClientBuilder};

use crate::currency::CurrencyCode;
use crate::error::{ConfigError, FetchError};

pub const DEFAULT_API_URL: &str = "https://api.frankfurter.app";

/// Where historical rate snapshots come from.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Returns the raw response body for `date` relative to `base`.
    async fn fetch(&self, date: NaiveDate, base: &CurrencyCode) -> Result<String, FetchError>;
}

/// Rate API reached over HTTP, e.g. Frankfurter.
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let builder = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        Self::with_client_builder(base_url, builder)
    }

    /// Fails rather than falling back to a default client, which would have
    /// no request timeout.
    fn with_client_builder(base_url: &str, builder: ClientBuilder) -> Result<Self, ConfigError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ApiUrl(base_url.to_string()));
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, date: NaiveDate, base: &CurrencyCode) -> String {
        format!("{}/{}?from={}", self.base_url, date.format("%Y-%m-%d"), base)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self, date: NaiveDate, base: &CurrencyCode) -> Result<String, FetchError> {
        let url = self.url(date, base);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let text = resp.text().await?;

        Ok(text)
    }
}
