//! MySQL source implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};
use tracing::debug;

use super::dialect::{strip_definer, MysqlDialect};
use crate::config::DatabaseConfig;
use crate::core::identifier::quote_mysql;
use crate::core::{FetchRequest, Row, SourceDatabase, SqlNullType, SqlValue};
use crate::drivers::common::SqlDialect;
use crate::error::{Result, SamplerError};

/// Column metadata from `information_schema.COLUMNS`.
#[derive(Debug, Clone)]
pub(crate) struct MysqlColumn {
    pub name: String,
    pub extra: String,
}

impl MysqlColumn {
    /// `DEFAULT_GENERATED` marks expression defaults, not generated columns.
    pub(crate) fn is_generated(&self) -> bool {
        let extra = self.extra.to_ascii_uppercase();
        extra.contains("VIRTUAL GENERATED") || extra.contains("STORED GENERATED")
    }

    pub(crate) fn is_auto_increment(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("auto_increment")
    }
}

pub(crate) async fn load_columns(pool: &MySqlPool, table: &str) -> Result<Vec<MysqlColumn>> {
    let rows = sqlx::query(
        "SELECT CAST(COLUMN_NAME AS CHAR(255)), CAST(EXTRA AS CHAR(255)) \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
         ORDER BY ORDINAL_POSITION",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(MysqlColumn {
                name: row.try_get(0)?,
                extra: row.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
            })
        })
        .collect()
}

/// Read a `SHOW CREATE` column, which some servers report as binary.
fn text_column(row: &MySqlRow, idx: usize) -> Result<String> {
    match row.try_get::<String, _>(idx) {
        Ok(text) => Ok(text),
        Err(_) => {
            let bytes: Vec<u8> = row.try_get(idx)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

fn value_or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> SqlValue, null: SqlNullType) -> SqlValue {
    value.map(wrap).unwrap_or(SqlValue::Null(null))
}

/// Decode one column of a result row by its reported type.
fn convert_mysql_value(row: &MySqlRow, idx: usize) -> Result<SqlValue> {
    let type_name = row.columns()[idx].type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOLEAN" => value_or_null(row.try_get(idx)?, SqlValue::Bool, SqlNullType::Bool),
        "TINYINT" => value_or_null(
            row.try_get::<Option<i8>, _>(idx)?,
            |v| SqlValue::I16(i16::from(v)),
            SqlNullType::I16,
        ),
        "TINYINT UNSIGNED" => value_or_null(
            row.try_get::<Option<u8>, _>(idx)?,
            |v| SqlValue::I16(i16::from(v)),
            SqlNullType::I16,
        ),
        "SMALLINT" => value_or_null(row.try_get(idx)?, SqlValue::I16, SqlNullType::I16),
        "SMALLINT UNSIGNED" | "YEAR" => value_or_null(
            row.try_get::<Option<u16>, _>(idx)?,
            |v| SqlValue::I32(i32::from(v)),
            SqlNullType::I32,
        ),
        "MEDIUMINT" | "INT" => value_or_null(row.try_get(idx)?, SqlValue::I32, SqlNullType::I32),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => value_or_null(
            row.try_get::<Option<u32>, _>(idx)?,
            |v| SqlValue::I64(i64::from(v)),
            SqlNullType::I64,
        ),
        "BIGINT" => value_or_null(row.try_get(idx)?, SqlValue::I64, SqlNullType::I64),
        "BIGINT UNSIGNED" => value_or_null(
            row.try_get::<Option<u64>, _>(idx)?,
            |v| SqlValue::Decimal(Decimal::from(v)),
            SqlNullType::Decimal,
        ),
        "FLOAT" => value_or_null(row.try_get(idx)?, SqlValue::F32, SqlNullType::F32),
        "DOUBLE" => value_or_null(row.try_get(idx)?, SqlValue::F64, SqlNullType::F64),
        "DECIMAL" => value_or_null(
            row.try_get::<Option<Decimal>, _>(idx)?,
            SqlValue::Decimal,
            SqlNullType::Decimal,
        ),
        "DATE" => value_or_null(
            row.try_get::<Option<NaiveDate>, _>(idx)?,
            SqlValue::Date,
            SqlNullType::Date,
        ),
        "TIME" => value_or_null(
            row.try_get::<Option<NaiveTime>, _>(idx)?,
            SqlValue::Time,
            SqlNullType::Time,
        ),
        "DATETIME" => value_or_null(
            row.try_get::<Option<NaiveDateTime>, _>(idx)?,
            SqlValue::DateTime,
            SqlNullType::DateTime,
        ),
        "TIMESTAMP" => value_or_null(
            row.try_get::<Option<DateTime<Utc>>, _>(idx)?,
            |v| SqlValue::DateTime(v.naive_utc()),
            SqlNullType::DateTime,
        ),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => value_or_null(
            row.try_get::<Option<Vec<u8>>, _>(idx)?,
            SqlValue::Bytes,
            SqlNullType::Bytes,
        ),
        _ => value_or_null(
            row.try_get::<Option<String>, _>(idx)?,
            SqlValue::Text,
            SqlNullType::String,
        ),
    };
    Ok(value)
}

fn convert_mysql_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.push(column.name(), convert_mysql_value(row, idx)?);
    }
    Ok(out)
}

/// Reads schema and rows from a MySQL database.
pub struct MysqlSource {
    pool: MySqlPool,
    dialect: MysqlDialect,
}

impl MysqlSource {
    /// Connect using the source configuration.
    pub async fn connect(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        Ok(Self::from_pool(
            super::connect_pool(config, max_conns, "source", false).await?,
        ))
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: MysqlDialect::new(),
        }
    }

    async fn show_create(&self, kind: &str, name: &str, column: usize) -> Result<String> {
        let sql = format!("SHOW CREATE {} {}", kind, quote_mysql(name)?);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                SamplerError::SchemaExtraction(format!(
                    "{} '{}': {}",
                    kind.to_ascii_lowercase(),
                    name,
                    e
                ))
            })?;
        text_column(&row, column)
    }
}

#[async_trait]
impl SourceDatabase for MysqlSource {
    fn dialect(&self) -> &str {
        self.dialect.name()
    }

    async fn table_definition(&self, table: &str) -> Result<String> {
        self.show_create("TABLE", table, 1).await
    }

    async fn view_definition(&self, view: &str) -> Result<String> {
        Ok(strip_definer(&self.show_create("VIEW", view, 1).await?))
    }

    async fn trigger_definitions(&self, table: &str) -> Result<Vec<String>> {
        let names = sqlx::query(
            "SELECT CAST(TRIGGER_NAME AS CHAR(255)) FROM information_schema.TRIGGERS \
             WHERE EVENT_OBJECT_SCHEMA = DATABASE() AND EVENT_OBJECT_TABLE = ? \
             ORDER BY ACTION_TIMING, EVENT_MANIPULATION, ACTION_ORDER",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut definitions = Vec::with_capacity(names.len());
        for row in &names {
            let name: String = row.try_get(0)?;
            definitions.push(strip_definer(&self.show_create("TRIGGER", &name, 2).await?));
        }
        Ok(definitions)
    }

    async fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<Row>> {
        let columns = load_columns(&self.pool, &request.table).await?;
        if columns.is_empty() {
            return Err(SamplerError::SchemaExtraction(format!(
                "table '{}' not found",
                request.table
            )));
        }

        let select_list = columns
            .iter()
            .filter(|c| !c.is_generated())
            .map(|c| quote_mysql(&c.name))
            .collect::<Result<Vec<_>>>()?;
        let sql = self.dialect.select_sql(request, &select_list)?;
        debug!("{}: {}", request.table, sql);

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(convert_mysql_row).collect()
    }
}
