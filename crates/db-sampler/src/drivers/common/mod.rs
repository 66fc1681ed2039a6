//! Utilities shared by the SQL drivers.
//!
//! - [`dialect`]: statement rendering behind the [`SqlDialect`] strategy
//! - [`tls`]: TLS settings for PostgreSQL connections

pub mod dialect;
pub mod tls;

pub use dialect::SqlDialect;
pub use tls::SslMode;
