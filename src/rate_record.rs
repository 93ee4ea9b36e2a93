use chrono::NaiveDate;

use crate::currency::CurrencyCode;

/// One storage-ready row: `Currency_Code`, `Rate_vs_USD`, `Date`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    pub currency_code: CurrencyCode,
    pub rate_vs_usd: f64,
    pub date: NaiveDate,
}
