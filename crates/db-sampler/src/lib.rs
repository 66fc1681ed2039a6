//! # db-sampler
//!
//! Copy a referentially-consistent sample of a relational database.
//!
//! A run migrates one configured *set* of tables and views from a source
//! database to a destination of the same dialect:
//!
//! - **Schema copy**: each table is dropped and recreated from the source DDL
//! - **Sampling**: a per-table sampler decides which rows are copied
//! - **References**: sampled key values are remembered so later tables can
//!   be restricted to rows that match them
//! - **Cleaning**: configured cleaners anonymize column values on the way
//! - **Batched writes**: rows are inserted in batches and sequences are reset
//!
//! ## Example
//!
//! ```rust,no_run
//! use db_sampler::{drivers, Config, Migrator};
//!
//! # async fn run() -> db_sampler::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let (source, destination) = drivers::connect(
//!     &config.source,
//!     &config.destination,
//!     config.migration.max_connections,
//! )
//! .await?;
//! let migrator = Migrator::new(source, destination, config.migration.clone());
//! for set in config.select_sets(&[])? {
//!     let result = migrator.execute(set).await?;
//!     println!("{}: {} rows", result.set, result.rows_total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cleaner;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod reference;
pub mod sampler;
pub mod writer;

// Re-exports for convenient access
pub use cleaner::{CleanerRegistry, FieldCleaner, RowCleaner};
pub use config::{Config, DatabaseConfig, MigrationConfig, MigrationSet, TableOrder, TableSpec};
pub use crate::core::{DestinationDatabase, FetchRequest, Row, SourceDatabase, SqlValue};
pub use error::{Result, SamplerError};
pub use orchestrator::{plan_set, Migrator, PlannedTable, RunResult, TableResult};
pub use reference::ReferenceStore;
pub use sampler::{Sampler, SamplerContext, SamplerFactory, SamplerRegistry};
pub use writer::TableWriter;
