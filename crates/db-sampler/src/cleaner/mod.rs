//! Field-level cleaning of sampled rows.
//!
//! A table's `clean` section maps columns to directives of the form
//! `alias[:arg[:arg...]]`:
//!
//! ```yaml
//! clean:
//!   email: email
//!   phone: "randomdigits:11"
//!   notes: "fixed:redacted"
//!   login: "template:user{id}"
//! ```
//!
//! Each alias resolves to a [`FieldCleaner`] in the [`CleanerRegistry`];
//! [`RowCleaner`] applies the directives of one table, in declaration order.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::TableSpec;
use crate::core::{Row, SqlValue};
use crate::error::{Result, SamplerError};

pub use builtin::{
    BlankCleaner, CopyCleaner, DateOfBirthCleaner, EmailCleaner, FixedCleaner, HashCleaner,
    NullCleaner, RandomDigitsCleaner, TemplateCleaner, ZeroCleaner,
};

/// Transform one field value, with the full row available for context.
pub trait FieldCleaner: Send + Sync {
    /// Produce the replacement for `value`.
    fn clean(&self, value: &SqlValue, row: &Row, args: &[String]) -> Result<SqlValue>;

    /// Reject unusable directive arguments before any row is processed.
    fn check_args(&self, _args: &[String]) -> Result<()> {
        Ok(())
    }
}

/// A parsed `alias:arg:arg` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDirective {
    pub alias: String,
    pub args: Vec<String>,
}

impl CleanDirective {
    pub fn parse(directive: &str) -> Result<Self> {
        let mut parts = directive.split(':');
        let alias = parts.next().unwrap_or("").trim().to_lowercase();
        if alias.is_empty() {
            return Err(SamplerError::Config(format!(
                "Invalid cleaning directive '{}'",
                directive
            )));
        }
        Ok(Self {
            alias,
            args: parts.map(str::to_string).collect(),
        })
    }
}

/// Registry of field cleaners keyed by lowercase alias.
#[derive(Default, Clone)]
pub struct CleanerRegistry {
    cleaners: HashMap<String, Arc<dyn FieldCleaner>>,
}

impl CleanerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in cleaners.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("null", Arc::new(NullCleaner));
        registry.register("blank", Arc::new(BlankCleaner));
        registry.register("empty", Arc::new(BlankCleaner));
        registry.register("zero", Arc::new(ZeroCleaner));
        registry.register("fixed", Arc::new(FixedCleaner));
        registry.register("hash", Arc::new(HashCleaner));
        registry.register("sha256", Arc::new(HashCleaner));
        registry.register("email", Arc::new(EmailCleaner));
        registry.register("randomdigits", Arc::new(RandomDigitsCleaner));
        registry.register("dateofbirth", Arc::new(DateOfBirthCleaner));
        registry.register("template", Arc::new(TemplateCleaner));
        registry.register("copy", Arc::new(CopyCleaner));
        registry
    }

    /// Register a cleaner under an alias (case-insensitive), replacing any
    /// existing cleaner with that alias.
    pub fn register(&mut self, alias: &str, cleaner: Arc<dyn FieldCleaner>) {
        self.cleaners.insert(alias.to_lowercase(), cleaner);
    }

    pub fn has(&self, alias: &str) -> bool {
        self.cleaners.contains_key(&alias.to_lowercase())
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.cleaners.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Look up a cleaner, or fail with a configuration error.
    pub fn require(&self, alias: &str) -> Result<Arc<dyn FieldCleaner>> {
        self.cleaners
            .get(&alias.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                SamplerError::Config(format!(
                    "Unrecognised cleaner '{}'. Known cleaners: {}",
                    alias,
                    self.aliases().join(", ")
                ))
            })
    }
}

struct CleanStep {
    column: String,
    alias: String,
    args: Vec<String>,
    cleaner: Arc<dyn FieldCleaner>,
}

/// The cleaning pipeline of one table.
pub struct RowCleaner {
    table: String,
    steps: Vec<CleanStep>,
}

impl RowCleaner {
    /// Resolve every directive of the table. Unknown aliases and unusable
    /// arguments are configuration errors.
    pub fn new(spec: &TableSpec, registry: &CleanerRegistry) -> Result<Self> {
        let mut steps = Vec::with_capacity(spec.clean.len());
        for (column, directive) in spec.clean.iter() {
            let parsed = CleanDirective::parse(directive)?;
            let cleaner = registry.require(&parsed.alias).map_err(|e| {
                SamplerError::Config(format!("{} (table '{}', column '{}')", e, spec.table, column))
            })?;
            cleaner.check_args(&parsed.args)?;
            steps.push(CleanStep {
                column: column.to_string(),
                alias: parsed.alias,
                args: parsed.args,
                cleaner,
            });
        }
        Ok(Self {
            table: spec.table.clone(),
            steps,
        })
    }

    /// Whether the table has no directives.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every directive in declaration order.
    ///
    /// Later directives see the output of earlier ones. The set of columns
    /// never changes; a directive naming a column the row does not have is a
    /// configuration error.
    pub fn clean_row(&self, mut row: Row) -> Result<Row> {
        for step in &self.steps {
            let current = row.get(&step.column).ok_or_else(|| {
                SamplerError::Config(format!(
                    "Column '{}' to clean with '{}' is missing from table '{}'",
                    step.column, step.alias, self.table
                ))
            })?;
            let cleaned = step.cleaner.clean(current, &row, &step.args)?;
            row.replace(&step.column, cleaned);
        }
        Ok(row)
    }
}
