//! SQL rendering shared by the PostgreSQL and MySQL drivers.
//!
//! A [`SqlDialect`] supplies identifier quoting and value literals; the
//! provided methods turn a [`FetchRequest`] or a batch of rows into a single
//! statement. Values are rendered as literals rather than bound parameters
//! so that types unknown to the client library (enums, arrays, network
//! types) round-trip through their text form and the server coerces them
//! back to the column type.

use crate::core::{FetchRequest, Row, SqlValue};
use crate::error::{Result, SamplerError};

pub trait SqlDialect: Send + Sync {
    /// Dialect name, matching `DatabaseKind::dialect_name`.
    fn name(&self) -> &'static str;

    /// Quote a validated identifier.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Render a value as a SQL literal.
    fn literal(&self, value: &SqlValue) -> String;

    /// `SELECT` for a fetch request.
    ///
    /// `select_list` holds already rendered column expressions; an empty list
    /// selects `*`.
    fn select_sql(&self, request: &FetchRequest, select_list: &[String]) -> Result<String> {
        let columns = if select_list.is_empty() {
            "*".to_string()
        } else {
            select_list.join(", ")
        };
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns,
            self.quote_ident(&request.table)?
        );

        let mut conditions = Vec::with_capacity(request.filters.len() + request.where_clauses.len());
        for filter in &request.filters {
            let column = self.quote_ident(&filter.column)?;
            if filter.values.is_empty() {
                conditions.push("1 = 0".to_string());
            } else {
                let values: Vec<String> = filter.values.iter().map(|v| self.literal(v)).collect();
                conditions.push(format!("{} IN ({})", column, values.join(", ")));
            }
        }
        for predicate in &request.where_clauses {
            conditions.push(format!("({})", predicate));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !request.order_by.is_empty() {
            let terms = request
                .order_by
                .iter()
                .map(|o| {
                    let direction = if o.descending { "DESC" } else { "ASC" };
                    Ok(format!("{} {}", self.quote_ident(&o.column)?, direction))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = request.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(sql)
    }

    /// Multi-row `INSERT` for a batch. Column order follows the first row.
    fn insert_sql(&self, table: &str, rows: &[Row]) -> Result<String> {
        let Some(first) = rows.first() else {
            return Err(SamplerError::driver(
                "insert_rows",
                format!("empty batch for table '{}'", table),
            ));
        };
        let columns: Vec<&str> = first.columns().collect();
        let quoted = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>>>()?;

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(SamplerError::driver(
                    "insert_rows",
                    format!(
                        "row with {} columns in a batch of {} columns for table '{}'",
                        row.len(),
                        columns.len(),
                        table
                    ),
                ));
            }
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = row.get(column).ok_or_else(|| {
                    SamplerError::driver(
                        "insert_rows",
                        format!("column '{}' missing from a row of table '{}'", column, table),
                    )
                })?;
                values.push(self.literal(value));
            }
            tuples.push(format!("({})", values.join(", ")));
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table)?,
            quoted.join(", "),
            tuples.join(", ")
        ))
    }
}

/// Render a float, spelling out the non-finite values the way both engines
/// accept in quoted form.
pub(crate) fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "'NaN'".to_string()
    } else if value.is_infinite() && value > 0.0 {
        "'Infinity'".to_string()
    } else if value.is_infinite() {
        "'-Infinity'".to_string()
    } else {
        value.to_string()
    }
}
