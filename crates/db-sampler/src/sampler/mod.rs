//! Sampling strategies.
//!
//! A [`Sampler`] decides which source rows of one table make it into the
//! destination. Every strategy shares the same template: produce the rows
//! ([`Sampler::sample`]), then record the columns listed under `remember` in
//! the run's [`ReferenceStore`] so that later tables can restrict themselves
//! to related rows ([`Sampler::execute`]).
//!
//! Strategies are selected by identifier through the [`SamplerRegistry`].

mod copy_all;
mod copy_empty;
mod limit;
mod matched;
mod newest;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::TableSpec;
use crate::core::{Row, SourceDatabase, SqlValue};
use crate::error::{Result, SamplerError};
use crate::reference::ReferenceStore;

pub use copy_all::CopyAllSampler;
pub use copy_empty::CopyEmptySampler;
pub use limit::LimitSampler;
pub use matched::MatchedSampler;
pub use newest::NewestSampler;
pub use registry::{SamplerFactory, SamplerRegistry};

/// Everything a sampler needs, handed over at construction.
#[derive(Clone)]
pub struct SamplerContext {
    /// The table's configuration.
    pub spec: TableSpec,
    /// Source database handle.
    pub source: Arc<dyn SourceDatabase>,
    /// The run's reference store.
    pub references: Arc<ReferenceStore>,
    /// Treat a never-populated reference as an error instead of an empty sample.
    pub strict_references: bool,
}

impl SamplerContext {
    pub fn new(
        spec: TableSpec,
        source: Arc<dyn SourceDatabase>,
        references: Arc<ReferenceStore>,
        strict_references: bool,
    ) -> Self {
        Self {
            spec,
            source,
            references,
            strict_references,
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.spec.table
    }

    /// Record the `remember` columns of `rows` in the reference store.
    ///
    /// Every rule is checked against every row before anything is stored, so
    /// a missing column leaves the store untouched.
    pub fn remember(&self, rows: &[Row]) -> Result<()> {
        if self.spec.remember.is_empty() {
            return Ok(());
        }

        let mut collected: Vec<(&str, Vec<SqlValue>)> = Vec::with_capacity(self.spec.remember.len());
        for (column, name) in self.spec.remember.iter() {
            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                let value = row.get(column).ok_or_else(|| {
                    SamplerError::Config(format!(
                        "Column '{}' remembered as '{}' is missing from a row of table '{}'",
                        column,
                        name,
                        self.table()
                    ))
                })?;
                values.push(value.clone());
            }
            collected.push((name.as_str(), values));
        }

        for (name, values) in collected {
            debug!(
                "{}: remembering {} values as '{}'",
                self.table(),
                values.len(),
                name
            );
            self.references.remember(name, values);
        }
        Ok(())
    }
}

/// A strategy producing the sample for one table.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Strategy identifier used in logs.
    fn name(&self) -> &str;

    /// The context the sampler was built with.
    fn context(&self) -> &SamplerContext;

    /// Produce the rows of the sample. Must not touch the reference store.
    async fn sample(&self) -> Result<Vec<Row>>;

    /// Produce the sample and record remembered values.
    ///
    /// Rows are returned exactly as [`Sampler::sample`] produced them.
    async fn execute(&self) -> Result<Vec<Row>> {
        let rows = self.sample().await?;
        self.context().remember(&rows)?;
        Ok(rows)
    }
}
