//! MySQL/MariaDB driver (feature `mysql`).
//!
//! - [`MysqlDialect`]: quoting and literal syntax
//! - [`MysqlSource`]: `SHOW CREATE` based DDL extraction and row fetching
//! - [`MysqlDestination`]: DDL execution, batched inserts, AUTO_INCREMENT fix-up
//!
//! Destination sessions run with `FOREIGN_KEY_CHECKS = 0`: extracted DDL keeps
//! its foreign keys, and tables are recreated one at a time in an order that
//! need not follow them.

mod destination;
mod dialect;
mod source;

pub use destination::MysqlDestination;
pub use dialect::MysqlDialect;
pub use source::MysqlSource;

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::drivers::common::SslMode;
use crate::error::{Result, SamplerError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

fn mysql_ssl_mode(ssl_mode: SslMode) -> MySqlSslMode {
    match ssl_mode {
        SslMode::Disable => MySqlSslMode::Disabled,
        SslMode::Require => MySqlSslMode::Required,
        SslMode::VerifyCa => MySqlSslMode::VerifyCa,
        SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
    }
}

/// Create a connection pool and check that it can reach the server.
pub(crate) async fn connect_pool(
    config: &DatabaseConfig,
    max_conns: usize,
    role: &str,
    disable_foreign_keys: bool,
) -> Result<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port())
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .ssl_mode(mysql_ssl_mode(SslMode::parse(&config.ssl_mode)?));

    let mut pool_options = MySqlPoolOptions::new()
        .max_connections(max_conns as u32)
        .acquire_timeout(POOL_CONNECTION_TIMEOUT);
    if disable_foreign_keys {
        pool_options = pool_options.after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET SESSION FOREIGN_KEY_CHECKS = 0")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        });
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| SamplerError::pool(e, format!("creating MySQL {} pool", role)))?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| SamplerError::pool(e, format!("testing MySQL {} connection", role)))?;

    info!(
        "Connected to MySQL {}: {}:{}/{}",
        role,
        config.host,
        config.port(),
        config.database
    );

    Ok(pool)
}
