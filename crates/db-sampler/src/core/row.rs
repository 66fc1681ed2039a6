//! Ordered row representation.

use super::value::SqlValue;

/// A row as an ordered list of `(column, value)` pairs.
///
/// Column order is the order the source produced. Cleaning replaces values in
/// place and never changes the set of columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append, used heavily by drivers and tests.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Append a column. Callers are responsible for not repeating names.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.fields.push((column.into(), value.into()));
    }

    /// Value for a column, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replace the value of an existing column.
    ///
    /// Returns the previous value, or `None` (leaving the row unchanged) when
    /// the column does not exist.
    pub fn replace(&mut self, column: &str, value: SqlValue) -> Option<SqlValue> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, slot)| std::mem::replace(slot, value))
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
