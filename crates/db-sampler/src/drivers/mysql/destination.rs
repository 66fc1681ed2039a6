//! MySQL destination implementation.

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use tracing::debug;

use super::dialect::MysqlDialect;
use super::source::load_columns;
use crate::config::DatabaseConfig;
use crate::core::identifier::quote_mysql;
use crate::core::{DestinationDatabase, Row};
use crate::drivers::common::SqlDialect;
use crate::error::Result;

/// Recreates schema and writes rows in a MySQL database.
pub struct MysqlDestination {
    pool: MySqlPool,
    dialect: MysqlDialect,
}

impl MysqlDestination {
    /// Connect using the destination configuration.
    pub async fn connect(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        Ok(Self::from_pool(
            super::connect_pool(config, max_conns, "destination", true).await?,
        ))
    }

    /// The pool's sessions must already run with `FOREIGN_KEY_CHECKS = 0`.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: MysqlDialect::new(),
        }
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DestinationDatabase for MysqlDestination {
    fn dialect(&self) -> &str {
        self.dialect.name()
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote_mysql(table)?))
            .await?;
        debug!("Dropped table {}", table);
        Ok(())
    }

    async fn create_table(&self, definition: &str) -> Result<()> {
        self.execute(definition).await?;
        Ok(())
    }

    async fn drop_view(&self, view: &str) -> Result<()> {
        self.execute(&format!("DROP VIEW IF EXISTS {}", quote_mysql(view)?))
            .await?;
        Ok(())
    }

    async fn create_view(&self, definition: &str) -> Result<()> {
        self.execute(definition).await?;
        Ok(())
    }

    async fn apply_triggers(&self, table: &str, definitions: &[String]) -> Result<()> {
        for definition in definitions {
            self.execute(definition).await?;
        }
        debug!("Applied {} triggers on {}", definitions.len(), table);
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = self.dialect.insert_sql(table, rows)?;
        self.execute(&sql).await
    }

    /// InnoDB clamps a lowered AUTO_INCREMENT to one past the current maximum.
    async fn finalize_table(&self, table: &str) -> Result<()> {
        let columns = load_columns(&self.pool, table).await?;
        if columns.iter().any(|c| c.is_auto_increment()) {
            self.execute(&format!(
                "ALTER TABLE {} AUTO_INCREMENT = 1",
                quote_mysql(table)?
            ))
            .await?;
            debug!("Reset AUTO_INCREMENT for {}", table);
        }
        Ok(())
    }
}
