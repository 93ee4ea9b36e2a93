use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::currency::CurrencyCode;
use crate::date_window::DateWindow;
use crate::error::ConfigError;

/// Fully qualified destination table, `database.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableId {
    /// `"schema"."table"`, safe to splice into SQL since every part was
    /// checked against the identifier grammar on parse.
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    // Postgres truncates identifiers beyond 63 bytes.
    s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TableId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [database, schema, table] if parts.iter().all(|p| is_identifier(p)) => Ok(Self {
                database: database.to_string(),
                schema: schema.to_string(),
                table: table.to_string(),
            }),
            _ => Err(ConfigError::TableId(s.to_string())),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// Database connection URL. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Everything a run needs, fixed before the first request.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub base_currency: CurrencyCode,
    pub destination: TableId,
    /// `None` only in dry-run mode.
    pub credential: Option<Credential>,
    pub window: DateWindow,
    pub pacing_delay: Duration,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub dry_run: bool,
}
