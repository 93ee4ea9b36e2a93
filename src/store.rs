//! Destination stores for rate records.
//!
//! Stores only ever append. Nothing deduplicates on `(Date, Currency_Code)`,
//! so loading the same date twice leaves two copies of its rows.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use crate::config::{Credential, TableId};
use crate::error::{AppendError, ConfigError};
use crate::rate_record::RateRecord;

/// Number of rows shown per batch in dry-run mode.
const PREVIEW_ROWS: usize = 5;

#[async_trait]
pub trait RateStore: Send {
    /// Appends the whole batch in one operation and returns the row count.
    async fn append(&mut self, records: &[RateRecord]) -> Result<u64, AppendError>;
}

pub struct PostgresStore {
    pool: PgPool,
    table: TableId,
}

impl PostgresStore {
    /// Connects, checks the database named by `table` is the one connected
    /// to, and creates the schema and table when missing.
    pub async fn connect(credential: &Credential, table: TableId) -> anyhow::Result<Self> {
        info!("Connecting to destination database for {}", table);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(credential.expose())
            .await?;

        let actual: String = sqlx::query_scalar("SELECT current_database()::text")
            .fetch_one(&pool)
            .await?;
        if actual != table.database {
            return Err(ConfigError::DatabaseMismatch {
                expected: table.database.clone(),
                actual,
            }
            .into());
        }

        let store = Self { pool, table };
        store.ensure_table().await?;

        Ok(store)
    }

    async fn ensure_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS \"{}\"",
            self.table.schema
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                \"Currency_Code\" TEXT NOT NULL, \
                \"Rate_vs_USD\" DOUBLE PRECISION NOT NULL, \
                \"Date\" DATE NOT NULL)",
            self.table.qualified()
        ))
        .execute(&self.pool)
        .await?;

        debug!("Destination table {} is ready", self.table);
        Ok(())
    }
}

/// One multi-row INSERT for the whole batch.
fn insert_query<'a>(table: &TableId, records: &'a [RateRecord]) -> QueryBuilder<'a, Postgres> {
    let mut query_builder = QueryBuilder::new(format!(
        "INSERT INTO {} (\"Currency_Code\", \"Rate_vs_USD\", \"Date\") ",
        table.qualified()
    ));

    query_builder.push_values(records, |mut b, record| {
        b.push_bind(record.currency_code.as_str())
            .push_bind(record.rate_vs_usd)
            .push_bind(record.date);
    });

    query_builder
}

#[async_trait]
impl RateStore for PostgresStore {
    async fn append(&mut self, records: &[RateRecord]) -> Result<u64, AppendError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query_builder = insert_query(&self.table, records);
        let result = query_builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

/// Logs a preview of each batch instead of writing it.
#[derive(Debug, Default)]
pub struct DryRunStore;

#[async_trait]
impl RateStore for DryRunStore {
    async fn append(&mut self, records: &[RateRecord]) -> Result<u64, AppendError> {
        for record in records.iter().take(PREVIEW_ROWS) {
            info!(
                "  {} {:>14} {}",
                record.currency_code, record.rate_vs_usd, record.date
            );
        }
        if records.len() > PREVIEW_ROWS {
            info!("  ... {} more", records.len() - PREVIEW_ROWS);
        }

        Ok(records.len() as u64)
    }
}
