//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DatabaseConfig};
use crate::core::identifier::validate_identifier;
use crate::error::{Result, SamplerError};
use crate::sampler::SamplerRegistry;

/// Validate the configuration.
pub fn validate(config: &Config, registry: &SamplerRegistry) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("destination", &config.destination)?;

    // Schema is copied verbatim, so both sides must speak the same dialect
    let source_kind = config.source.kind()?;
    let destination_kind = config.destination.kind()?;
    if source_kind != destination_kind {
        return Err(SamplerError::DialectMismatch {
            source_dialect: source_kind.dialect_name().to_string(),
            destination_dialect: destination_kind.dialect_name().to_string(),
        });
    }

    // Cannot sample into the database being read
    if config.source.host == config.destination.host
        && config.source.port() == config.destination.port()
        && config.source.database == config.destination.database
        && config.source.schema == config.destination.schema
    {
        return Err(SamplerError::Config(
            "source and destination cannot be the same database".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(SamplerError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.max_connections == 0 {
        return Err(SamplerError::Config(
            "migration.max_connections must be at least 1".into(),
        ));
    }

    if config.sets.is_empty() {
        return Err(SamplerError::Config(
            "at least one entry in sets is required".into(),
        ));
    }

    let mut set_names = HashSet::new();
    for set in &config.sets {
        if set.name.trim().is_empty() {
            return Err(SamplerError::Config("sets[].name is required".into()));
        }
        if !set_names.insert(set.name.as_str()) {
            return Err(SamplerError::Config(format!(
                "duplicate set name '{}'",
                set.name
            )));
        }
        if set.tables.is_empty() && set.views.is_empty() {
            return Err(SamplerError::Config(format!(
                "set '{}' has no tables or views",
                set.name
            )));
        }

        let mut table_names = HashSet::new();
        for spec in &set.tables {
            validate_identifier(&spec.table)?;
            if !table_names.insert(spec.table.as_str()) {
                return Err(SamplerError::Config(format!(
                    "table '{}' appears more than once in set '{}'",
                    spec.table, set.name
                )));
            }

            registry.validate(spec)?;

            for (column, name) in spec.remember.iter() {
                validate_identifier(column)?;
                if name.trim().is_empty() {
                    return Err(SamplerError::Config(format!(
                        "remember.{} of table '{}' needs a reference name",
                        column, spec.table
                    )));
                }
            }

            for (column, directive) in spec.clean.iter() {
                validate_identifier(column)?;
                if directive.split(':').next().unwrap_or("").trim().is_empty() {
                    return Err(SamplerError::Config(format!(
                        "clean.{} of table '{}' needs a cleaner name",
                        column, spec.table
                    )));
                }
            }
        }

        for view in &set.views {
            validate_identifier(view)?;
        }
    }

    Ok(())
}

fn validate_database(role: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(SamplerError::Config(format!("{}.host is required", role)));
    }
    if db.database.is_empty() {
        return Err(SamplerError::Config(format!("{}.database is required", role)));
    }
    if db.user.is_empty() {
        return Err(SamplerError::Config(format!("{}.user is required", role)));
    }
    db.kind()?;
    Ok(())
}
