//! PostgreSQL destination implementation.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tracing::debug;

use super::dialect::PostgresDialect;
use crate::config::DatabaseConfig;
use crate::core::identifier::quote_pg;
use crate::core::{DestinationDatabase, Row};
use crate::drivers::common::SqlDialect;
use crate::error::{Result, SamplerError};

/// Recreates schema and writes rows in a PostgreSQL schema.
pub struct PostgresDestination {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresDestination {
    /// Connect using the destination configuration.
    pub async fn connect(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        Ok(Self::from_pool(
            super::connect_pool(config, max_conns, "destination").await?,
        ))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect::new(),
        }
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SamplerError::pool(e, "getting PostgreSQL destination connection"))
    }
}

#[async_trait]
impl DestinationDatabase for PostgresDestination {
    fn dialect(&self) -> &str {
        self.dialect.name()
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", quote_pg(table)?);
        self.client().await?.batch_execute(&sql).await?;
        debug!("Dropped table {}", table);
        Ok(())
    }

    async fn create_table(&self, definition: &str) -> Result<()> {
        self.client().await?.batch_execute(definition).await?;
        Ok(())
    }

    async fn drop_view(&self, view: &str) -> Result<()> {
        let sql = format!("DROP VIEW IF EXISTS {} CASCADE", quote_pg(view)?);
        self.client().await?.batch_execute(&sql).await?;
        Ok(())
    }

    async fn create_view(&self, definition: &str) -> Result<()> {
        self.client().await?.batch_execute(definition).await?;
        Ok(())
    }

    async fn apply_triggers(&self, table: &str, definitions: &[String]) -> Result<()> {
        let client = self.client().await?;
        for definition in definitions {
            client.batch_execute(definition).await?;
        }
        debug!("Applied {} triggers on {}", definitions.len(), table);
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = self.dialect.insert_sql(table, rows)?;
        let inserted = self.client().await?.execute(sql.as_str(), &[]).await?;
        Ok(inserted)
    }

    /// Move every serial/identity sequence past the largest inserted value.
    async fn finalize_table(&self, table: &str) -> Result<()> {
        let client = self.client().await?;
        let quoted_table = quote_pg(table)?;

        let sequences = client
            .query(
                "SELECT a.attname::text, pg_catalog.pg_get_serial_sequence($1::text, a.attname::text) \
                 FROM pg_catalog.pg_attribute a \
                 WHERE a.attrelid = $1::text::regclass AND a.attnum > 0 AND NOT a.attisdropped",
                &[&quoted_table],
            )
            .await?;

        for row in &sequences {
            let column: String = row.get(0);
            let Some(sequence) = row.get::<_, Option<String>>(1) else {
                continue;
            };
            let quoted_column = quote_pg(&column)?;
            let sql = format!(
                "SELECT pg_catalog.setval($1::text::regclass, COALESCE(MAX({col})::bigint, 1), MAX({col}) IS NOT NULL) FROM {table}",
                col = quoted_column,
                table = quoted_table
            );
            client.query_one(sql.as_str(), &[&sequence]).await?;
            debug!("Reset sequence {} for {}.{}", sequence, table, column);
        }

        Ok(())
    }
}
