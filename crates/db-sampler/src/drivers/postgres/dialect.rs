//! PostgreSQL SQL dialect.

use crate::core::identifier::quote_pg;
use crate::core::SqlValue;
use crate::drivers::common::dialect::{float_literal, SqlDialect};
use crate::error::Result;

/// PostgreSQL quoting and literal syntax.
///
/// Assumes `standard_conforming_strings = on` (the default since 9.1), so
/// backslashes in string literals need no escaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }

    fn quote_str(text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null(_) => "NULL".to_string(),
            SqlValue::Bool(true) => "TRUE".to_string(),
            SqlValue::Bool(false) => "FALSE".to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => float_literal(f64::from(*v)),
            SqlValue::F64(v) => float_literal(*v),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Text(v) => Self::quote_str(v),
            SqlValue::Bytes(v) => format!("'\\x{}'::bytea", hex::encode(v)),
            other => other
                .to_text()
                .map(|text| Self::quote_str(&text))
                .unwrap_or_else(|| "NULL".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FetchRequest, OrderBy, Row, SqlNullType};
    use chrono::NaiveDate;

    #[test]
    fn test_literals() {
        let d = PostgresDialect::new();
        assert_eq!(d.literal(&SqlValue::Null(SqlNullType::I32)), "NULL");
        assert_eq!(d.literal(&SqlValue::Bool(true)), "TRUE");
        assert_eq!(d.literal(&SqlValue::I64(-5)), "-5");
        assert_eq!(d.literal(&SqlValue::Text("O'Brien".into())), "'O''Brien'");
        assert_eq!(d.literal(&SqlValue::Bytes(vec![0xca, 0xfe])), "'\\xcafe'::bytea");
        assert_eq!(d.literal(&SqlValue::F64(f64::NAN)), "'NaN'");
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(d.literal(&SqlValue::Date(date)), "'2024-02-29'");
    }

    #[test]
    fn test_select_sql() {
        let request = FetchRequest::table("orders")
            .with_filter("customer_id", vec![SqlValue::I64(1), SqlValue::I64(2)])
            .with_where(vec!["total > 0".to_string()])
            .with_order(vec![OrderBy::desc("id")])
            .with_limit(Some(10));

        let sql = PostgresDialect.select_sql(&request, &[]).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"orders\" WHERE \"customer_id\" IN (1, 2) AND (total > 0) \
             ORDER BY \"id\" DESC LIMIT 10"
        );
    }

    #[test]
    fn test_select_sql_with_columns() {
        let sql = PostgresDialect
            .select_sql(
                &FetchRequest::table("t"),
                &["\"id\"".to_string(), "\"tags\"::text AS \"tags\"".to_string()],
            )
            .unwrap();
        assert_eq!(sql, "SELECT \"id\", \"tags\"::text AS \"tags\" FROM \"t\"");
    }

    #[test]
    fn test_insert_sql() {
        let rows = vec![
            Row::new().with("id", 1i64).with("name", "Ada"),
            Row::new().with("id", 2i64).with("name", SqlValue::Null(SqlNullType::String)),
        ];
        let sql = PostgresDialect.insert_sql("customers", &rows).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"customers\" (\"id\", \"name\") VALUES (1, 'Ada'), (2, NULL)"
        );
    }

    #[test]
    fn test_insert_sql_rejects_ragged_batch() {
        let rows = vec![
            Row::new().with("id", 1i64),
            Row::new().with("id", 2i64).with("name", "x"),
        ];
        assert!(PostgresDialect.insert_sql("customers", &rows).is_err());
        assert!(PostgresDialect.insert_sql("customers", &[]).is_err());
    }
}
