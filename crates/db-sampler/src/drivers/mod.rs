//! Database driver implementations.
//!
//! Each driver module implements the core traits for one engine:
//!
//! - [`postgres`]: PostgreSQL driver
//! - `mysql`: MySQL/MariaDB driver (feature `mysql`)
//! - [`memory`]: in-process database for tests and dry runs
//! - [`common`]: shared SQL rendering and TLS helpers
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` implementing [`SqlDialect`],
//!    [`SourceDatabase`] and [`DestinationDatabase`]
//! 2. Add a [`DatabaseKind`] variant and dispatch it in [`connect_source`]
//!    and [`connect_destination`]
//! 3. Gate the driver with a feature flag in `Cargo.toml`

pub mod common;
pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod postgres;

pub use common::{SqlDialect, SslMode};
pub use memory::MemoryDatabase;

use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::core::{DestinationDatabase, SourceDatabase};
use crate::error::{Result, SamplerError};

#[cfg(not(feature = "mysql"))]
fn mysql_disabled() -> SamplerError {
    SamplerError::Config(
        "MySQL support is not compiled in. Rebuild with the 'mysql' feature".to_string(),
    )
}

/// Open the source database described by `config`.
pub async fn connect_source(
    config: &DatabaseConfig,
    max_conns: usize,
) -> Result<Arc<dyn SourceDatabase>> {
    match config.kind()? {
        DatabaseKind::Postgres => Ok(Arc::new(
            postgres::PostgresSource::connect(config, max_conns).await?,
        )),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Arc::new(
            mysql::MysqlSource::connect(config, max_conns).await?,
        )),
        #[cfg(not(feature = "mysql"))]
        DatabaseKind::Mysql => Err(mysql_disabled()),
    }
}

/// Open the destination database described by `config`.
pub async fn connect_destination(
    config: &DatabaseConfig,
    max_conns: usize,
) -> Result<Arc<dyn DestinationDatabase>> {
    match config.kind()? {
        DatabaseKind::Postgres => Ok(Arc::new(
            postgres::PostgresDestination::connect(config, max_conns).await?,
        )),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Arc::new(
            mysql::MysqlDestination::connect(config, max_conns).await?,
        )),
        #[cfg(not(feature = "mysql"))]
        DatabaseKind::Mysql => Err(mysql_disabled()),
    }
}

/// Open both databases, refusing mismatched engines before connecting.
pub async fn connect(
    source: &DatabaseConfig,
    destination: &DatabaseConfig,
    max_conns: usize,
) -> Result<(Arc<dyn SourceDatabase>, Arc<dyn DestinationDatabase>)> {
    let source_kind = source.kind()?;
    let destination_kind = destination.kind()?;
    if source_kind != destination_kind {
        return Err(SamplerError::DialectMismatch {
            source_dialect: source_kind.dialect_name().to_string(),
            destination_dialect: destination_kind.dialect_name().to_string(),
        });
    }

    let source_db = connect_source(source, max_conns).await?;
    let destination_db = connect_destination(destination, max_conns).await?;
    Ok((source_db, destination_db))
}
