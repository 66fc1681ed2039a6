//! Identifier validation and quoting.
//!
//! Table and column names come from configuration and are spliced into SQL,
//! so every driver goes through these helpers instead of formatting names
//! directly. Raw `where` predicates from configuration are screened for
//! statement separators and comments before they reach a driver.

use crate::error::{Result, SamplerError};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SamplerError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SamplerError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SamplerError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Screen a raw `where` predicate taken from configuration.
///
/// The predicate is embedded as `AND (<predicate>)`, so it must be a single
/// boolean expression: semicolons and SQL comment markers are rejected, as
/// are unbalanced parentheses that could close the surrounding group.
pub fn validate_predicate(predicate: &str) -> Result<()> {
    if predicate.trim().is_empty() {
        return Err(SamplerError::Config(
            "where clause cannot be empty".to_string(),
        ));
    }

    if predicate.contains(';') {
        return Err(SamplerError::Config(format!(
            "SECURITY: where clause contains semicolon (possible injection): {:?}",
            predicate
        )));
    }

    if predicate.contains("--") || predicate.contains("/*") || predicate.contains("*/") {
        return Err(SamplerError::Config(format!(
            "SECURITY: where clause contains SQL comment markers (possible injection): {:?}",
            predicate
        )));
    }

    let mut depth: i32 = 0;
    let mut in_string = false;
    for ch in predicate.chars() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if depth != 0 || in_string {
        return Err(SamplerError::Config(format!(
            "where clause has unbalanced parentheses or quotes: {:?}",
            predicate
        )));
    }

    Ok(())
}
