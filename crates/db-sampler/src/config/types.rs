//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ordered::OrderedMap;
use crate::core::{OrderBy, SqlValue};
use crate::error::{Result, SamplerError};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database the sample is read from.
    pub source: DatabaseConfig,

    /// Database the sample is written to. Must use the same dialect as the source.
    pub destination: DatabaseConfig,

    /// Run behavior shared by every set.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Named groups of tables and views migrated together in one run.
    pub sets: Vec<MigrationSet>,
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Mysql,
}

impl DatabaseKind {
    /// Normalize a configured `type`, accepting the usual aliases.
    pub fn parse(db_type: &str) -> Result<Self> {
        match db_type.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseKind::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseKind::Mysql),
            other => Err(SamplerError::Config(format!(
                "Unsupported database type '{}'. Valid values: postgres, mysql",
                other
            ))),
        }
    }

    /// Dialect name reported by drivers of this kind.
    pub fn dialect_name(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Mysql => "mysql",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseKind::Postgres => 5432,
            DatabaseKind::Mysql => 3306,
        }
    }
}

/// Connection settings for a source or destination database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database type: postgres or mysql (default: postgres).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432 for postgres, 3306 for mysql).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the tables (PostgreSQL only, default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl DatabaseConfig {
    /// Normalized database kind.
    pub fn kind(&self) -> Result<DatabaseKind> {
        DatabaseKind::parse(&self.r#type)
    }

    /// Effective port, falling back to the engine default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| {
            self.kind()
                .map(|k| k.default_port())
                .unwrap_or(DatabaseKind::Postgres.default_port())
        })
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Order in which the tables of a set are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOrder {
    /// Producers of a remembered reference run before its consumers;
    /// otherwise declaration order.
    #[default]
    Dependency,

    /// Exactly the order tables are declared in.
    Declared,
}

impl TableOrder {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dependency" | "dependencies" => Ok(TableOrder::Dependency),
            "declared" | "config" => Ok(TableOrder::Declared),
            other => Err(SamplerError::Config(format!(
                "Invalid table_order '{}'. Valid values: dependency, declared",
                other
            ))),
        }
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows buffered by the writer before an insert is issued (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum connections per database pool (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Fail a reference-filtered table when the reference it depends on was
    /// never populated, instead of migrating it empty (default: false).
    #[serde(default)]
    pub strict_references: bool,

    /// Table processing order (default: dependency).
    #[serde(default)]
    pub table_order: TableOrder,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_connections: default_max_connections(),
            strict_references: false,
            table_order: TableOrder::default(),
        }
    }
}

/// A named group of tables and views migrated together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSet {
    /// Set name, used in logs and on the command line.
    pub name: String,

    /// Tables, in declaration order.
    #[serde(default)]
    pub tables: Vec<TableSpec>,

    /// Views recreated after every table has been migrated.
    #[serde(default)]
    pub views: Vec<String>,
}

impl MigrationSet {
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// A literal value in a `constraints` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ConfigScalar {
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            ConfigScalar::Bool(v) => SqlValue::Bool(*v),
            ConfigScalar::Int(v) => SqlValue::I64(*v),
            ConfigScalar::Float(v) => SqlValue::F64(*v),
            ConfigScalar::Text(v) => SqlValue::Text(v.clone()),
        }
    }
}

/// Either a single literal or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValues {
    Many(Vec<ConfigScalar>),
    One(ConfigScalar),
}

impl ConstraintValues {
    pub fn to_sql_values(&self) -> Vec<SqlValue> {
        match self {
            ConstraintValues::Many(values) => values.iter().map(ConfigScalar::to_sql_value).collect(),
            ConstraintValues::One(value) => vec![value.to_sql_value()],
        }
    }
}

/// How one table is sampled, remembered and cleaned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub table: String,

    /// Sampler identifier (default: "copyall").
    #[serde(default = "default_sampler")]
    pub sampler: String,

    /// Maximum number of rows (required by `limit` and `newest`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Ordering terms, each `column [ASC|DESC]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,

    /// Column to reference name: values recorded after sampling.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub remember: OrderedMap<String>,

    /// Column to reference name: rows kept only when the column value was
    /// remembered under that name (`matched` sampler).
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub references: OrderedMap<String>,

    /// Column to literal values (`matched` sampler).
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub constraints: OrderedMap<ConstraintValues>,

    /// Raw SQL predicates (`matched` sampler).
    #[serde(default, rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub where_clauses: Vec<String>,

    /// Column used by the `newest` sampler (default: "id").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,

    /// Column to cleaning directive, applied in declaration order.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub clean: OrderedMap<String>,
}

impl TableSpec {
    /// A spec for `table` using `sampler` and no further options.
    pub fn new(table: impl Into<String>, sampler: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sampler: sampler.into(),
            limit: None,
            order_by: Vec::new(),
            remember: OrderedMap::new(),
            references: OrderedMap::new(),
            constraints: OrderedMap::new(),
            where_clauses: Vec::new(),
            id_column: None,
            clean: OrderedMap::new(),
        }
    }

    /// Parsed ordering terms.
    pub fn order_terms(&self) -> Result<Vec<OrderBy>> {
        self.order_by.iter().map(|c| OrderBy::parse(c)).collect()
    }

    /// The `limit` parameter, or a configuration error naming the sampler
    /// that needs it.
    pub fn demand_limit(&self, required_by: &str) -> Result<u64> {
        self.limit.ok_or_else(|| {
            SamplerError::Config(format!(
                "'limit' missing from config of table '{}' required by {}",
                self.table, required_by
            ))
        })
    }

    /// Reference names this table reads from.
    pub fn consumed_references(&self) -> impl Iterator<Item = &str> {
        self.references.values().map(String::as_str)
    }

    /// Reference names this table writes to.
    pub fn produced_references(&self) -> impl Iterator<Item = &str> {
        self.remember.values().map(String::as_str)
    }
}

// Default value functions for serde
fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_max_connections() -> usize {
    4
}

fn default_sampler() -> String {
    "copyall".to_string()
}
