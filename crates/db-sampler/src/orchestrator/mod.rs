//! Migration orchestrator - runs one set from source to destination.

mod plan;

pub use plan::{order_tables, plan_set, PlannedTable};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cleaner::{CleanerRegistry, FieldCleaner, RowCleaner};
use crate::config::{MigrationConfig, MigrationSet};
use crate::core::{DestinationDatabase, SourceDatabase};
use crate::error::{Result, SamplerError};
use crate::reference::ReferenceStore;
use crate::sampler::{Sampler, SamplerContext, SamplerRegistry};
use crate::writer::TableWriter;

/// Migration orchestrator.
pub struct Migrator {
    source: Arc<dyn SourceDatabase>,
    destination: Arc<dyn DestinationDatabase>,
    settings: MigrationConfig,
    samplers: SamplerRegistry,
    cleaners: CleanerRegistry,
    config_hash: Option<String>,
}

/// Rows written for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub table: String,
    pub sampler: String,
    pub rows: u64,
}

/// A trigger definition that could not be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFailure {
    pub table: String,
    pub error: String,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Name of the migrated set.
    pub set: String,

    /// Final status.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables in execution order.
    pub tables: Vec<TableResult>,

    /// Total rows written.
    pub rows_total: u64,

    /// Views recreated.
    pub views: Vec<String>,

    /// Tables whose triggers could not be applied.
    pub trigger_failures: Vec<TriggerFailure>,

    /// Hash of the configuration the run was started from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl RunResult {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A table with its sampler and cleaner already built.
struct PreparedTable {
    sampler: Box<dyn Sampler>,
    cleaner: RowCleaner,
}

impl PreparedTable {
    fn table(&self) -> &str {
        self.sampler.context().table()
    }
}

impl Migrator {
    /// Create a migrator with the built-in samplers and cleaners.
    pub fn new(
        source: Arc<dyn SourceDatabase>,
        destination: Arc<dyn DestinationDatabase>,
        settings: MigrationConfig,
    ) -> Self {
        Self {
            source,
            destination,
            settings,
            samplers: SamplerRegistry::with_builtins(),
            cleaners: CleanerRegistry::with_builtins(),
            config_hash: None,
        }
    }

    /// Replace the sampler registry.
    pub fn with_samplers(mut self, samplers: SamplerRegistry) -> Self {
        self.samplers = samplers;
        self
    }

    /// Report `hash` (see [`crate::Config::hash`]) in every run result.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Replace the cleaner registry.
    pub fn with_cleaners(mut self, cleaners: CleanerRegistry) -> Self {
        self.cleaners = cleaners;
        self
    }

    /// Register a custom cleaner for subsequent runs.
    pub fn register_cleaner(&mut self, alias: &str, cleaner: Arc<dyn FieldCleaner>) {
        self.cleaners.register(alias, cleaner);
    }

    pub fn settings(&self) -> &MigrationConfig {
        &self.settings
    }

    /// Check that both sides speak the same dialect.
    pub fn check_dialects(&self) -> Result<()> {
        let source_dialect = self.source.dialect();
        let destination_dialect = self.destination.dialect();
        if source_dialect != destination_dialect {
            return Err(SamplerError::DialectMismatch {
                source_dialect: source_dialect.to_string(),
                destination_dialect: destination_dialect.to_string(),
            });
        }
        Ok(())
    }

    /// Migrate one set.
    ///
    /// Tables are processed one at a time; the first failing table or view
    /// aborts the run. Trigger failures are logged and reported in the result.
    pub async fn execute(&self, set: &MigrationSet) -> Result<RunResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("{}: starting run {}", set.name, run_id);

        // Phase 1: Validate
        self.check_dialects()?;

        // Phase 2: Plan
        let references = Arc::new(ReferenceStore::new());
        let prepared = self.prepare(set, &references)?;
        debug!(
            "{}: execution order: {}",
            set.name,
            prepared
                .iter()
                .map(PreparedTable::table)
                .collect::<Vec<_>>()
                .join(", ")
        );

        // Phase 3: Tables
        let mut tables = Vec::with_capacity(prepared.len());
        for table in &prepared {
            let rows = self.migrate_table(set, table).await.map_err(|e| {
                error!(
                    "{}: failed to migrate '{}' with '{}': {}",
                    set.name,
                    table.table(),
                    table.sampler.name(),
                    e
                );
                SamplerError::table(table.table(), table.sampler.name(), e)
            })?;
            info!(
                "{}: migrated '{}' with '{}': {} rows",
                set.name,
                table.table(),
                table.sampler.name(),
                rows
            );
            tables.push(TableResult {
                table: table.table().to_string(),
                sampler: table.sampler.name().to_string(),
                rows,
            });
        }

        // Phase 4: Views
        for view in &set.views {
            self.migrate_view(view).await.map_err(|e| {
                error!("{}: failed to migrate view '{}': {}", set.name, view, e);
                SamplerError::view(view, e)
            })?;
            info!("{}: migrated view '{}'", set.name, view);
        }

        // Phase 5: Triggers
        let mut trigger_failures = Vec::new();
        for table in &prepared {
            if let Err(e) = self.migrate_triggers(table.table()).await {
                error!(
                    "{}: failed to apply triggers on '{}': {}",
                    set.name,
                    table.table(),
                    e
                );
                trigger_failures.push(TriggerFailure {
                    table: table.table().to_string(),
                    error: e.to_string(),
                });
            }
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_total = tables.iter().map(|t| t.rows).sum();

        let result = RunResult {
            run_id,
            set: set.name.clone(),
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_seconds: duration,
            tables,
            rows_total,
            views: set.views.clone(),
            trigger_failures,
            config_hash: self.config_hash.clone(),
        };

        info!(
            "{}: {} tables, {} rows, {} views in {:.1}s",
            result.set,
            result.tables.len(),
            result.rows_total,
            result.views.len(),
            result.duration_seconds
        );

        Ok(result)
    }

    /// Order the set and build every sampler and cleaner before any table is
    /// touched.
    fn prepare(&self, set: &MigrationSet, references: &Arc<ReferenceStore>) -> Result<Vec<PreparedTable>> {
        order_tables(set, &self.settings)?
            .into_iter()
            .map(|spec| {
                let context = SamplerContext::new(
                    spec.clone(),
                    self.source.clone(),
                    references.clone(),
                    self.settings.strict_references,
                );
                let in_table = |e| SamplerError::table(&spec.table, &spec.sampler, e);
                Ok(PreparedTable {
                    sampler: self.samplers.build(context).map_err(in_table)?,
                    cleaner: RowCleaner::new(spec, &self.cleaners).map_err(in_table)?,
                })
            })
            .collect()
    }

    async fn migrate_table(&self, set: &MigrationSet, table: &PreparedTable) -> Result<u64> {
        let name = table.table();

        debug!("{}: recreating table '{}'", set.name, name);
        let definition = self.source.table_definition(name).await?;
        self.destination.reset_table(name, &definition).await?;

        let rows = table.sampler.execute().await?;
        debug!("{}: sampled {} rows from '{}'", set.name, rows.len(), name);

        let mut writer = TableWriter::new(self.destination.clone(), name, self.settings.batch_size);
        for row in rows {
            writer.write(table.cleaner.clean_row(row)?).await?;
        }
        writer.post_write().await
    }

    async fn migrate_view(&self, view: &str) -> Result<()> {
        let definition = self.source.view_definition(view).await?;
        self.destination.reset_view(view, &definition).await
    }

    async fn migrate_triggers(&self, table: &str) -> Result<()> {
        let definitions = self.source.trigger_definitions(table).await?;
        if definitions.is_empty() {
            return Ok(());
        }
        debug!("{}: applying {} triggers", table, definitions.len());
        self.destination.apply_triggers(table, &definitions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrderedMap, TableSpec};
    use crate::core::{Row, SqlValue};
    use crate::drivers::memory::MemoryDatabase;

    fn databases() -> (Arc<MemoryDatabase>, Arc<MemoryDatabase>) {
        let source = Arc::new(MemoryDatabase::new("memory"));
        source.seed_table(
            "customers",
            vec![
                Row::new().with("id", 1i64).with("email", "ada@example.com"),
                Row::new().with("id", 2i64).with("email", "grace@example.com"),
            ],
        );
        (source, Arc::new(MemoryDatabase::new("memory")))
    }

    fn customers_set() -> MigrationSet {
        let mut customers = TableSpec::new("customers", "copyall");
        customers.clean = OrderedMap::from_iter([("email", "fixed:hidden".to_string())]);
        MigrationSet {
            name: "small".into(),
            tables: vec![customers],
            views: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_execute_writes_cleaned_rows() {
        let (source, destination) = databases();
        let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

        let result = migrator.execute(&customers_set()).await.unwrap();

        assert_eq!(result.status, "completed");
        assert_eq!(result.rows_total, 2);
        assert_eq!(result.tables[0].sampler, "copyall");
        let rows = destination.rows("customers");
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.get("email") == Some(&SqlValue::Text("hidden".into()))));
    }

    #[tokio::test]
    async fn test_dialect_mismatch_touches_nothing() {
        let (source, _) = databases();
        let destination = Arc::new(MemoryDatabase::new("other"));
        let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

        let err = migrator.execute(&customers_set()).await.unwrap_err();
        assert!(matches!(err, SamplerError::DialectMismatch { .. }));
        assert!(destination.journal().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cleaner_fails_before_any_table() {
        let (source, destination) = databases();
        let mut set = customers_set();
        set.tables[0].clean = OrderedMap::from_iter([("email", "scramble".to_string())]);
        let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

        assert!(migrator.execute(&set).await.unwrap_err().is_config());
        assert!(destination.journal().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_errors_name_the_table() {
        let mut bad_cleaner = customers_set();
        bad_cleaner.tables[0].clean = OrderedMap::from_iter([("email", "fixed".to_string())]);
        let mut bad_order = customers_set();
        bad_order.tables[0].order_by = vec!["id sideways".to_string()];

        for set in [bad_cleaner, bad_order] {
            let (source, destination) = databases();
            let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

            let err = migrator.execute(&set).await.unwrap_err();
            assert!(err.is_config(), "{}", err);
            assert!(err.to_string().contains("customers"), "{}", err);
            assert!(err.format_detailed().contains("Caused by:"));
            assert!(destination.journal().is_empty());
        }
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let (source, destination) = databases();
        let migrator = Migrator::new(source, destination, MigrationConfig::default());
        let result = migrator.execute(&customers_set()).await.unwrap();

        let json = result.to_json().unwrap();
        assert!(json.contains("\"set\": \"small\""));
        assert!(json.contains("\"rows_total\": 2"));
        assert!(!json.contains("config_hash"));
    }

    #[tokio::test]
    async fn test_result_reports_config_hash() {
        let (source, destination) = databases();
        let migrator = Migrator::new(source, destination, MigrationConfig::default())
            .with_config_hash("abc123");
        let result = migrator.execute(&customers_set()).await.unwrap();

        assert_eq!(result.config_hash.as_deref(), Some("abc123"));
        assert!(result.to_json().unwrap().contains("\"config_hash\": \"abc123\""));
    }
}
