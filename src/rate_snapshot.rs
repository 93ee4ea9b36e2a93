use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::currency::CurrencyCode;
use crate::error::ParseError;
use crate::rate_record::RateRecord;

/// Response body as sent by the rate API. Fields other than `date` and
/// `rates` (`amount`, `base`) are ignored.
#[derive(Debug, Deserialize, PartialEq)]
struct RawSnapshot {
    date: String,
    rates: HashMap<String, f64>,
}

/// One day's rates relative to the requested base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    /// The date the API reports, which may differ from the requested one
    /// (weekends and holidays resolve to the previous business day).
    pub date: NaiveDate,
    pub rates: BTreeMap<CurrencyCode, f64>,
}

impl RateSnapshot {
    /// Parses and validates a response body. Nothing is returned unless every
    /// entry is well formed.
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        let raw: RawSnapshot = serde_json::from_str(body)?;

        let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d")
            .map_err(|_| ParseError::Date(raw.date.clone()))?;

        if raw.rates.is_empty() {
            return Err(ParseError::EmptyRates);
        }

        let mut rates = BTreeMap::new();
        for (code, rate) in raw.rates {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ParseError::Rate { code, rate });
            }
            let code: CurrencyCode = code
                .parse()
                .map_err(|_| ParseError::CurrencyCode(code.clone()))?;
            if rates.insert(code.clone(), rate).is_some() {
                return Err(ParseError::DuplicateCode(code.to_string()));
            }
        }

        Ok(Self { date, rates })
    }

    /// Flattens the snapshot into one record per currency, ordered by code.
    pub fn to_records(&self) -> Vec<RateRecord> {
        self.rates
            .iter()
            .map(|(code, rate)| RateRecord {
                currency_code: code.clone(),
                rate_vs_usd: *rate,
                date: self.date,
            })
            .collect()
    }
}
