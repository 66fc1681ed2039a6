//! In-process database for tests and dry runs.
//!
//! One [`MemoryDatabase`] can act as source, destination, or both. It
//! evaluates [`FetchRequest`] filters, ordering and limits the way a SQL
//! driver would, records every call in a journal, and can be told to fail a
//! given operation on a given object.
//!
//! Table definitions have the form `CREATE TABLE <name>` and view
//! definitions `CREATE VIEW <name>`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::{DestinationDatabase, FetchRequest, Row, SourceDatabase};
use crate::error::{Result, SamplerError};

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<Row>>,
    views: BTreeMap<String, String>,
    triggers: HashMap<String, Vec<String>>,
    failures: Vec<(String, String, String)>,
    journal: Vec<String>,
    finalized: HashMap<String, usize>,
    fetches: usize,
}

/// In-memory implementation of both database traits.
pub struct MemoryDatabase {
    dialect: String,
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    /// Create an empty database reporting `dialect`.
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create (or replace) a table holding `rows`.
    pub fn seed_table(&self, table: &str, rows: Vec<Row>) {
        self.state().tables.insert(table.to_string(), rows);
    }

    /// Create (or replace) a view.
    pub fn seed_view(&self, view: &str) {
        self.state()
            .views
            .insert(view.to_string(), view_definition(view));
    }

    /// Set the trigger definitions of a table.
    pub fn seed_triggers(&self, table: &str, definitions: Vec<String>) {
        self.state().triggers.insert(table.to_string(), definitions);
    }

    /// Make every future `operation` on `name` fail with `message`.
    ///
    /// Operations are the trait method names, e.g. `fetch_rows`,
    /// `insert_rows`, `apply_triggers`.
    pub fn fail_on(&self, operation: &str, name: &str, message: &str) {
        self.state().failures.push((
            operation.to_string(),
            name.to_string(),
            message.to_string(),
        ));
    }

    /// Rows currently held by a table (empty if it does not exist).
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    pub fn has_view(&self, view: &str) -> bool {
        self.state().views.contains_key(view)
    }

    /// Trigger definitions currently held for a table.
    pub fn triggers(&self, table: &str) -> Vec<String> {
        self.state().triggers.get(table).cloned().unwrap_or_default()
    }

    /// Every call made so far, as `"<operation> <name>"`.
    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    /// Number of `fetch_rows` calls.
    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    /// Number of `finalize_table` calls for a table.
    pub fn finalize_count(&self, table: &str) -> usize {
        self.state().finalized.get(table).copied().unwrap_or(0)
    }

    /// Journal the call, then apply any injected failure.
    fn enter(&self, operation: &str, name: &str) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.journal.push(format!("{} {}", operation, name));
        let failure = state
            .failures
            .iter()
            .find(|(op, target, _)| op == operation && target == name)
            .map(|(_, _, message)| message.clone());
        match failure {
            Some(message) => Err(SamplerError::driver(operation, message)),
            None => Ok(state),
        }
    }
}

fn table_definition(table: &str) -> String {
    format!("CREATE TABLE {}", table)
}

fn view_definition(view: &str) -> String {
    format!("CREATE VIEW {}", view)
}

fn parse_definition<'a>(definition: &'a str, prefix: &str) -> Result<&'a str> {
    definition
        .strip_prefix(prefix)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SamplerError::Unsupported(format!(
                "memory database cannot execute '{}'",
                definition
            ))
        })
}

fn missing_table(operation: &str, table: &str) -> SamplerError {
    SamplerError::driver(operation, format!("table '{}' does not exist", table))
}

fn compare_rows(a: &Row, b: &Row, request: &FetchRequest) -> Ordering {
    for term in &request.order_by {
        let ordering = match (a.get(&term.column), b.get(&term.column)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        let ordering = if term.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl SourceDatabase for MemoryDatabase {
    fn dialect(&self) -> &str {
        &self.dialect
    }

    async fn table_definition(&self, table: &str) -> Result<String> {
        let state = self.enter("table_definition", table)?;
        if !state.tables.contains_key(table) {
            return Err(SamplerError::SchemaExtraction(format!(
                "table '{}' not found",
                table
            )));
        }
        Ok(table_definition(table))
    }

    async fn view_definition(&self, view: &str) -> Result<String> {
        let state = self.enter("view_definition", view)?;
        state.views.get(view).cloned().ok_or_else(|| {
            SamplerError::SchemaExtraction(format!("view '{}' not found", view))
        })
    }

    async fn trigger_definitions(&self, table: &str) -> Result<Vec<String>> {
        let state = self.enter("trigger_definitions", table)?;
        Ok(state.triggers.get(table).cloned().unwrap_or_default())
    }

    async fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<Row>> {
        let mut state = self.enter("fetch_rows", &request.table)?;
        state.fetches += 1;

        if !request.where_clauses.is_empty() {
            return Err(SamplerError::Unsupported(format!(
                "memory database cannot evaluate where clauses on '{}'",
                request.table
            )));
        }
        let source = state
            .tables
            .get(&request.table)
            .ok_or_else(|| missing_table("fetch_rows", &request.table))?;

        let mut rows = Vec::new();
        for row in source {
            let mut keep = true;
            for filter in &request.filters {
                let value = row.get(&filter.column).ok_or_else(|| {
                    SamplerError::driver(
                        "fetch_rows",
                        format!(
                            "column '{}' does not exist in table '{}'",
                            filter.column, request.table
                        ),
                    )
                })?;
                if !filter.values.iter().any(|v| value.loosely_eq(v)) {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row.clone());
            }
        }

        rows.sort_by(|a, b| compare_rows(a, b, request));
        if let Some(limit) = request.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }
}

#[async_trait]
impl DestinationDatabase for MemoryDatabase {
    fn dialect(&self) -> &str {
        &self.dialect
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let mut state = self.enter("drop_table", table)?;
        state.tables.remove(table);
        state.triggers.remove(table);
        Ok(())
    }

    async fn create_table(&self, definition: &str) -> Result<()> {
        let table = parse_definition(definition, "CREATE TABLE ")?;
        let mut state = self.enter("create_table", table)?;
        if state.tables.contains_key(table) {
            return Err(SamplerError::driver(
                "create_table",
                format!("table '{}' already exists", table),
            ));
        }
        state.tables.insert(table.to_string(), Vec::new());
        Ok(())
    }

    async fn drop_view(&self, view: &str) -> Result<()> {
        self.enter("drop_view", view)?.views.remove(view);
        Ok(())
    }

    async fn create_view(&self, definition: &str) -> Result<()> {
        let view = parse_definition(definition, "CREATE VIEW ")?;
        let mut state = self.enter("create_view", view)?;
        if state.views.contains_key(view) {
            return Err(SamplerError::driver(
                "create_view",
                format!("view '{}' already exists", view),
            ));
        }
        state.views.insert(view.to_string(), definition.to_string());
        Ok(())
    }

    async fn apply_triggers(&self, table: &str, definitions: &[String]) -> Result<()> {
        let mut state = self.enter("apply_triggers", table)?;
        if !state.tables.contains_key(table) {
            return Err(missing_table("apply_triggers", table));
        }
        state
            .triggers
            .entry(table.to_string())
            .or_default()
            .extend(definitions.iter().cloned());
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<u64> {
        let mut state = self.enter("insert_rows", table)?;
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| missing_table("insert_rows", table))?;
        target.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn finalize_table(&self, table: &str) -> Result<()> {
        let mut state = self.enter("finalize_table", table)?;
        *state.finalized.entry(table.to_string()).or_default() += 1;
        Ok(())
    }
}
