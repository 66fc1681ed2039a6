//! Run-scoped store of remembered values.
//!
//! A sampler that declares `remember: { id: customer_ids }` appends the `id`
//! value of every row it produced under the name `customer_ids`. A later
//! sampler reads the accumulated sequence to restrict its own table to related
//! rows. One store is created per migration run and injected into every
//! sampler of that run; it is never persisted.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::SqlValue;

/// Append-only mapping of reference name to an ordered value sequence.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    references: RwLock<HashMap<String, Vec<SqlValue>>>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values under a name, creating the name if needed.
    ///
    /// The name counts as populated afterwards even if `values` is empty.
    /// Remembering the same values twice keeps both copies.
    pub fn remember(&self, name: &str, values: Vec<SqlValue>) {
        let mut references = self
            .references
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        references
            .entry(name.to_string())
            .or_default()
            .extend(values);
    }

    /// Every value remembered under `name`, in append order.
    ///
    /// Unknown names yield an empty sequence.
    pub fn lookup(&self, name: &str) -> Vec<SqlValue> {
        self.references
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `name` has ever been remembered, even with zero values.
    pub fn contains(&self, name: &str) -> bool {
        self.references
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Number of values remembered under `name`.
    pub fn len(&self, name: &str) -> usize {
        self.references
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .map_or(0, Vec::len)
    }

    /// All populated names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .references
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
