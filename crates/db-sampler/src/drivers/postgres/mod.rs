//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: quoting and literal syntax
//! - [`PostgresSource`]: catalog-based DDL extraction and row fetching
//! - [`PostgresDestination`]: DDL execution, batched inserts, sequence fix-up
//!
//! Every connection pins `search_path` to the configured schema, so catalog
//! functions such as `pg_get_viewdef` render unqualified names and the
//! extracted DDL lands in the destination's own schema.

mod dialect;
mod destination;
mod source;

pub use destination::PostgresDestination;
pub use dialect::PostgresDialect;
pub use source::PostgresSource;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::identifier::quote_pg;
use crate::drivers::common::SslMode;
use crate::error::{Result, SamplerError};

/// Create a connection pool and check that it can reach the server.
pub(crate) async fn connect_pool(config: &DatabaseConfig, max_conns: usize, role: &str) -> Result<Pool> {
    let search_path = quote_pg(&config.schema)?.replace(' ', "\\ ");

    let mut pg_config = PgConfig::new();
    pg_config
        .host(&config.host)
        .port(config.port())
        .dbname(&config.database)
        .user(&config.user)
        .password(&config.password)
        .application_name("db-sampler")
        .options(&format!("-c search_path={}", search_path));

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match SslMode::parse(&config.ssl_mode)?.postgres_connector(&config.host)? {
        Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
    };
    let pool = Pool::builder(mgr)
        .max_size(max_conns)
        .build()
        .map_err(|e| SamplerError::pool(e, format!("creating PostgreSQL {} pool", role)))?;

    let client = pool
        .get()
        .await
        .map_err(|e| SamplerError::pool(e, format!("testing PostgreSQL {} connection", role)))?;
    client.simple_query("SELECT 1").await?;

    info!(
        "Connected to PostgreSQL {}: {}:{}/{} (schema {})",
        role,
        config.host,
        config.port(),
        config.database,
        config.schema
    );

    Ok(pool)
}
