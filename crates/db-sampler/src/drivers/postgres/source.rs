//! PostgreSQL source implementation.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tracing::debug;

use super::dialect::PostgresDialect;
use crate::config::DatabaseConfig;
use crate::core::identifier::quote_pg;
use crate::core::{FetchRequest, Row, SourceDatabase, SqlNullType, SqlValue};
use crate::drivers::common::SqlDialect;
use crate::error::{Result, SamplerError};

/// Relation kinds readable as tables (ordinary and partitioned).
const TABLE_KINDS: &str = "('r', 'p')";
const VIEW_KINDS: &str = "('v')";

/// Types decoded natively; every other column is selected as text.
const NATIVE_TYPES: &[&str] = &[
    "bool",
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "numeric",
    "uuid",
    "timestamp",
    "timestamptz",
    "date",
    "time",
    "bytea",
    "text",
    "varchar",
    "bpchar",
    "name",
];

/// Column metadata from `pg_attribute`.
#[derive(Debug, Clone)]
pub(crate) struct PgColumn {
    pub name: String,
    pub type_name: String,
    pub formatted_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub identity: String,
    pub generated: String,
}

impl PgColumn {
    fn is_generated(&self) -> bool {
        !self.generated.is_empty()
    }

    fn is_identity(&self) -> bool {
        !self.identity.is_empty()
    }

    /// Expression selecting this column under its own name.
    fn select_expr(&self) -> Result<String> {
        let quoted = quote_pg(&self.name)?;
        if NATIVE_TYPES.contains(&self.type_name.as_str()) {
            Ok(quoted)
        } else {
            Ok(format!("{}::text AS {}", quoted, quoted))
        }
    }

    /// Column clause of a `CREATE TABLE`.
    ///
    /// Identity and serial columns both become `GENERATED BY DEFAULT AS
    /// IDENTITY` so sampled key values can be inserted verbatim.
    fn definition(&self) -> Result<String> {
        let mut sql = format!("{} {}", quote_pg(&self.name)?, self.formatted_type);
        let serial = self
            .default
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("))
            && matches!(self.type_name.as_str(), "int2" | "int4" | "int8");

        if self.is_identity() || serial {
            sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else if let Some(default) = &self.default {
            if self.is_generated() {
                sql.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", default));
            } else {
                sql.push_str(&format!(" DEFAULT {}", default));
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        Ok(sql)
    }
}

/// Find a relation in the pinned schema.
pub(crate) async fn relation_oid(client: &Object, name: &str, kinds: &str) -> Result<Option<u32>> {
    let sql = format!(
        "SELECT c.oid FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = current_schema() AND c.relname = $1 AND c.relkind IN {}",
        kinds
    );
    let row = client.query_opt(sql.as_str(), &[&name]).await?;
    Ok(row.map(|r| r.get::<_, u32>(0)))
}

pub(crate) async fn load_columns(client: &Object, oid: u32) -> Result<Vec<PgColumn>> {
    let sql = r#"
        SELECT
            a.attname::text,
            t.typname::text,
            pg_catalog.format_type(a.atttypid, a.atttypmod),
            a.attnotnull,
            pg_catalog.pg_get_expr(d.adbin, d.adrelid),
            a.attidentity::text,
            a.attgenerated::text
        FROM pg_catalog.pg_attribute a
        JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
        LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
        WHERE a.attrelid = $1 AND a.attnum > 0 AND NOT a.attisdropped
        ORDER BY a.attnum
    "#;

    let rows = client.query(sql, &[&oid]).await?;
    Ok(rows
        .iter()
        .map(|row| PgColumn {
            name: row.get(0),
            type_name: row.get(1),
            formatted_type: row.get(2),
            not_null: row.get(3),
            default: row.get(4),
            identity: row.get(5),
            generated: row.get(6),
        })
        .collect())
}

fn value_or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> SqlValue, null: SqlNullType) -> SqlValue {
    value.map(wrap).unwrap_or(SqlValue::Null(null))
}

/// Decode one column of a result row by its reported type.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue> {
    let type_name = row.columns()[idx].type_().name();
    let value = match type_name {
        "bool" => value_or_null(row.try_get(idx)?, SqlValue::Bool, SqlNullType::Bool),
        "int2" => value_or_null(row.try_get(idx)?, SqlValue::I16, SqlNullType::I16),
        "int4" => value_or_null(row.try_get(idx)?, SqlValue::I32, SqlNullType::I32),
        "int8" => value_or_null(row.try_get(idx)?, SqlValue::I64, SqlNullType::I64),
        "float4" => value_or_null(row.try_get(idx)?, SqlValue::F32, SqlNullType::F32),
        "float8" => value_or_null(row.try_get(idx)?, SqlValue::F64, SqlNullType::F64),
        "numeric" => value_or_null(row.try_get(idx)?, SqlValue::Decimal, SqlNullType::Decimal),
        "uuid" => value_or_null(row.try_get(idx)?, SqlValue::Uuid, SqlNullType::Uuid),
        "timestamp" => value_or_null(row.try_get(idx)?, SqlValue::DateTime, SqlNullType::DateTime),
        "timestamptz" => value_or_null(
            row.try_get(idx)?,
            SqlValue::DateTimeOffset,
            SqlNullType::DateTimeOffset,
        ),
        "date" => value_or_null(row.try_get(idx)?, SqlValue::Date, SqlNullType::Date),
        "time" => value_or_null(row.try_get(idx)?, SqlValue::Time, SqlNullType::Time),
        "bytea" => value_or_null(row.try_get(idx)?, SqlValue::Bytes, SqlNullType::Bytes),
        _ => value_or_null(row.try_get(idx)?, SqlValue::Text, SqlNullType::String),
    };
    Ok(value)
}

fn convert_pg_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.push(column.name(), convert_pg_value(row, idx)?);
    }
    Ok(out)
}

/// Reads schema and rows from a PostgreSQL schema.
pub struct PostgresSource {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresSource {
    /// Connect using the source configuration.
    pub async fn connect(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        Ok(Self::from_pool(super::connect_pool(config, max_conns, "source").await?))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect::new(),
        }
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SamplerError::pool(e, "getting PostgreSQL source connection"))
    }

    async fn table_oid(&self, client: &Object, table: &str) -> Result<u32> {
        relation_oid(client, table, TABLE_KINDS)
            .await?
            .ok_or_else(|| SamplerError::SchemaExtraction(format!("table '{}' not found", table)))
    }
}

#[async_trait]
impl SourceDatabase for PostgresSource {
    fn dialect(&self) -> &str {
        self.dialect.name()
    }

    async fn table_definition(&self, table: &str) -> Result<String> {
        let client = self.client().await?;
        let oid = self.table_oid(&client, table).await?;

        let mut clauses = Vec::new();
        for column in load_columns(&client, oid).await? {
            clauses.push(column.definition()?);
        }

        // Foreign keys are left out: the sample is a subset by construction.
        let constraints = client
            .query(
                "SELECT conname::text, pg_catalog.pg_get_constraintdef(oid) \
                 FROM pg_catalog.pg_constraint \
                 WHERE conrelid = $1 AND contype IN ('p', 'u', 'c', 'x') \
                 ORDER BY contype, conname",
                &[&oid],
            )
            .await?;
        for row in &constraints {
            let name: String = row.get(0);
            let definition: String = row.get(1);
            clauses.push(format!("CONSTRAINT {} {}", quote_pg(&name)?, definition));
        }

        let mut ddl = format!(
            "CREATE TABLE {} (\n    {}\n);",
            quote_pg(table)?,
            clauses.join(",\n    ")
        );

        let indexes = client
            .query(
                "SELECT pg_catalog.pg_get_indexdef(i.indexrelid) \
                 FROM pg_catalog.pg_index i \
                 WHERE i.indrelid = $1 AND NOT EXISTS ( \
                     SELECT 1 FROM pg_catalog.pg_constraint c \
                     WHERE c.conindid = i.indexrelid AND c.conrelid = i.indrelid \
                       AND c.contype IN ('p', 'u', 'x')) \
                 ORDER BY i.indexrelid",
                &[&oid],
            )
            .await?;
        for row in &indexes {
            let definition: String = row.get(0);
            ddl.push('\n');
            ddl.push_str(&definition);
            ddl.push(';');
        }

        debug!("{}: extracted definition ({} indexes)", table, indexes.len());
        Ok(ddl)
    }

    async fn view_definition(&self, view: &str) -> Result<String> {
        let client = self.client().await?;
        let oid = relation_oid(&client, view, VIEW_KINDS)
            .await?
            .ok_or_else(|| SamplerError::SchemaExtraction(format!("view '{}' not found", view)))?;

        let row = client
            .query_one("SELECT pg_catalog.pg_get_viewdef($1::oid, true)", &[&oid])
            .await?;
        let body: String = row.get(0);
        Ok(format!(
            "CREATE VIEW {} AS\n{}",
            quote_pg(view)?,
            body.trim_end()
        ))
    }

    async fn trigger_definitions(&self, table: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let oid = self.table_oid(&client, table).await?;
        let rows = client
            .query(
                "SELECT pg_catalog.pg_get_triggerdef(oid) FROM pg_catalog.pg_trigger \
                 WHERE tgrelid = $1 AND NOT tgisinternal ORDER BY tgname",
                &[&oid],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<Row>> {
        let client = self.client().await?;
        let oid = self.table_oid(&client, &request.table).await?;

        let select_list = load_columns(&client, oid)
            .await?
            .iter()
            .filter(|c| !c.is_generated())
            .map(PgColumn::select_expr)
            .collect::<Result<Vec<_>>>()?;
        let sql = self.dialect.select_sql(request, &select_list)?;
        debug!("{}: {}", request.table, sql);

        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter().map(convert_pg_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, type_name: &str, formatted: &str) -> PgColumn {
        PgColumn {
            name: name.into(),
            type_name: type_name.into(),
            formatted_type: formatted.into(),
            not_null: false,
            default: None,
            identity: String::new(),
            generated: String::new(),
        }
    }

    #[test]
    fn test_serial_becomes_identity() {
        let mut id = column("id", "int4", "integer");
        id.not_null = true;
        id.default = Some("nextval('customers_id_seq'::regclass)".into());
        assert_eq!(
            id.definition().unwrap(),
            "\"id\" integer GENERATED BY DEFAULT AS IDENTITY NOT NULL"
        );
    }

    #[test]
    fn test_default_and_generated_columns() {
        let mut status = column("status", "varchar", "character varying(20)");
        status.default = Some("'new'::character varying".into());
        assert_eq!(
            status.definition().unwrap(),
            "\"status\" character varying(20) DEFAULT 'new'::character varying"
        );

        let mut total = column("total", "numeric", "numeric(10,2)");
        total.default = Some("(price * qty)".into());
        total.generated = "s".into();
        assert_eq!(
            total.definition().unwrap(),
            "\"total\" numeric(10,2) GENERATED ALWAYS AS ((price * qty)) STORED"
        );
    }

    #[test]
    fn test_non_native_types_are_selected_as_text() {
        assert_eq!(column("id", "int8", "bigint").select_expr().unwrap(), "\"id\"");
        assert_eq!(
            column("tags", "_text", "text[]").select_expr().unwrap(),
            "\"tags\"::text AS \"tags\""
        );
        assert_eq!(
            column("doc", "jsonb", "jsonb").select_expr().unwrap(),
            "\"doc\"::text AS \"doc\""
        );
    }
}
