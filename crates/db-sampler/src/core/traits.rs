//! Core traits for database-agnostic sampling.
//!
//! This module defines the two collaborator contracts used by the sampling
//! engine:
//!
//! - [`SourceDatabase`]: Reads schema definitions and rows from the source
//! - [`DestinationDatabase`]: Recreates schema and writes rows on the destination
//!
//! Samplers describe *which* rows they want through a [`FetchRequest`]; turning
//! that into SQL is entirely the driver's job, so no sampler ever builds a
//! query string.

use std::fmt;

use async_trait::async_trait;

use crate::error::{Result, SamplerError};

use super::identifier::validate_identifier;
use super::row::Row;
use super::value::SqlValue;

/// Restrict a column to a set of values (`column IN (...)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub values: Vec<SqlValue>,
}

/// A single ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parse `"column"`, `"column ASC"` or `"column DESC"`.
    pub fn parse(clause: &str) -> Result<Self> {
        let parts: Vec<&str> = clause.split_whitespace().collect();
        let (column, descending) = match parts.as_slice() {
            [column] => (*column, false),
            [column, direction] => match direction.to_ascii_lowercase().as_str() {
                "asc" => (*column, false),
                "desc" => (*column, true),
                other => {
                    return Err(SamplerError::Config(format!(
                        "Invalid order direction '{}' in '{}'. Valid values: ASC, DESC",
                        other, clause
                    )))
                }
            },
            _ => {
                return Err(SamplerError::Config(format!(
                    "Invalid order clause '{}'. Expected 'column [ASC|DESC]'",
                    clause
                )))
            }
        };
        validate_identifier(column)?;
        Ok(Self {
            column: column.to_string(),
            descending,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {}", self.column, direction)
    }
}

/// Description of the rows a sampler wants from one source table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchRequest {
    /// Table name.
    pub table: String,
    /// Column membership filters, combined with AND.
    pub filters: Vec<ColumnFilter>,
    /// Raw SQL predicates, combined with AND.
    pub where_clauses: Vec<String>,
    /// Ordering terms, applied in order.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
}

impl FetchRequest {
    /// Request every row of a table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, values: Vec<SqlValue>) -> Self {
        self.filters.push(ColumnFilter {
            column: column.into(),
            values,
        });
        self
    }

    pub fn with_where(mut self, predicates: impl IntoIterator<Item = String>) -> Self {
        self.where_clauses.extend(predicates);
        self
    }

    pub fn with_order(mut self, order: impl IntoIterator<Item = OrderBy>) -> Self {
        self.order_by.extend(order);
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }
}

/// Read schema and data from a source database.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Dialect identifier (e.g., "postgres", "mysql").
    fn dialect(&self) -> &str;

    /// DDL that recreates the table (and its indexes) on a database of the
    /// same dialect.
    async fn table_definition(&self, table: &str) -> Result<String>;

    /// DDL that recreates the view.
    async fn view_definition(&self, view: &str) -> Result<String>;

    /// DDL statements for every trigger defined on the table.
    async fn trigger_definitions(&self, table: &str) -> Result<Vec<String>>;

    /// Fetch the rows described by the request, in source order unless the
    /// request specifies an ordering.
    async fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<Row>>;
}

/// Recreate schema and write rows on a destination database.
#[async_trait]
pub trait DestinationDatabase: Send + Sync {
    /// Dialect identifier (e.g., "postgres", "mysql").
    fn dialect(&self) -> &str;

    /// Drop a table if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Execute a table definition obtained from [`SourceDatabase::table_definition`].
    async fn create_table(&self, definition: &str) -> Result<()>;

    /// Drop a view if it exists.
    async fn drop_view(&self, view: &str) -> Result<()>;

    /// Execute a view definition obtained from [`SourceDatabase::view_definition`].
    async fn create_view(&self, definition: &str) -> Result<()>;

    /// Apply trigger definitions for a table.
    async fn apply_triggers(&self, table: &str, definitions: &[String]) -> Result<()>;

    /// Insert a batch of rows. Returns the number of rows inserted.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<u64>;

    /// End-of-table hook run once after all rows have been inserted
    /// (sequence and auto-increment fix-up).
    async fn finalize_table(&self, table: &str) -> Result<()>;

    /// Drop and recreate a table from its source definition.
    ///
    /// Template method: drivers normally only implement the two primitives.
    async fn reset_table(&self, table: &str, definition: &str) -> Result<()> {
        self.drop_table(table).await?;
        self.create_table(definition).await
    }

    /// Drop and recreate a view from its source definition.
    async fn reset_view(&self, view: &str, definition: &str) -> Result<()> {
        self.drop_view(view).await?;
        self.create_view(definition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_parse() {
        assert_eq!(OrderBy::parse("id").unwrap(), OrderBy::asc("id"));
        assert_eq!(OrderBy::parse("id DESC").unwrap(), OrderBy::desc("id"));
        assert_eq!(OrderBy::parse("  created_at   asc ").unwrap(), OrderBy::asc("created_at"));
    }

    #[test]
    fn test_order_by_parse_rejects_garbage() {
        assert!(OrderBy::parse("id sideways").is_err());
        assert!(OrderBy::parse("id DESC, name").is_err());
        assert!(OrderBy::parse("").is_err());
    }

    #[test]
    fn test_order_by_display() {
        assert_eq!(OrderBy::desc("id").to_string(), "id DESC");
    }

    #[test]
    fn test_fetch_request_builder() {
        let request = FetchRequest::table("orders")
            .with_filter("customer_id", vec![SqlValue::I64(1)])
            .with_where(vec!["status <> 'void'".to_string()])
            .with_order(vec![OrderBy::desc("id")])
            .with_limit(Some(10));

        assert_eq!(request.table, "orders");
        assert_eq!(request.filters.len(), 1);
        assert_eq!(request.where_clauses, vec!["status <> 'void'"]);
        assert_eq!(request.limit, Some(10));
    }
}
