//! MySQL/MariaDB SQL dialect.

use crate::core::identifier::quote_mysql;
use crate::core::SqlValue;
use crate::drivers::common::dialect::{float_literal, SqlDialect};
use crate::error::Result;

/// MySQL quoting and literal syntax.
///
/// Assumes the default `sql_mode` without `NO_BACKSLASH_ESCAPES`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }

    fn quote_str(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("''"),
                '\0' => out.push_str("\\0"),
                other => out.push(other),
            }
        }
        out.push('\'');
        out
    }
}

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
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
            SqlValue::Bytes(v) => format!("X'{}'", hex::encode(v)),
            // DATETIME and TIMESTAMP carry no offset
            SqlValue::DateTimeOffset(v) => {
                Self::quote_str(&v.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            other => other
                .to_text()
                .map(|text| Self::quote_str(&text))
                .unwrap_or_else(|| "NULL".to_string()),
        }
    }
}

/// Remove the `DEFINER=user@host` clause from view and trigger DDL, so the
/// object is owned by the connecting user on the destination.
pub(crate) fn strip_definer(ddl: &str) -> String {
    let Some(start) = ddl.find("DEFINER=") else {
        return ddl.to_string();
    };
    let rest = &ddl[start..];
    let mut in_quote = false;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        match c {
            '`' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let tail = rest[end..].trim_start();
    format!("{}{}", &ddl[..start], tail)
}
