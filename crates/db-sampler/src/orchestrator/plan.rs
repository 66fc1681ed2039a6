//! Table execution order.
//!
//! A table that `remember`s a name must run before every table that
//! `references` it. The order is a topological sort of that graph which falls
//! back to declaration order wherever the graph leaves a choice, so a set that
//! is already declared producer-first runs exactly as written.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::{MigrationConfig, MigrationSet, TableOrder, TableSpec};
use crate::error::{Result, SamplerError};
use crate::sampler::SamplerRegistry;

/// One entry of a set's execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTable {
    pub table: String,
    /// Canonical name of the resolved sampler.
    pub sampler: &'static str,
}

/// Order the tables of a set for execution.
pub fn order_tables<'a>(set: &'a MigrationSet, settings: &MigrationConfig) -> Result<Vec<&'a TableSpec>> {
    check_producers(set, settings.strict_references)?;
    match settings.table_order {
        TableOrder::Declared => Ok(set.tables.iter().collect()),
        TableOrder::Dependency => dependency_order(set),
    }
}

/// Resolve the order and sampler of every table without touching a database.
pub fn plan_set(
    set: &MigrationSet,
    settings: &MigrationConfig,
    registry: &SamplerRegistry,
) -> Result<Vec<PlannedTable>> {
    order_tables(set, settings)?
        .into_iter()
        .map(|spec| {
            registry.validate(spec)?;
            Ok(PlannedTable {
                table: spec.table.clone(),
                sampler: registry.require(spec)?.name,
            })
        })
        .collect()
}

/// Report references that no table of the set remembers.
fn check_producers(set: &MigrationSet, strict: bool) -> Result<()> {
    for spec in &set.tables {
        for name in spec.consumed_references() {
            let produced = set
                .tables
                .iter()
                .any(|other| other.produced_references().any(|p| p == name));
            if produced {
                continue;
            }
            if strict {
                return Err(SamplerError::Config(format!(
                    "Reference '{}' required by table '{}' is not remembered by any table of set '{}'",
                    name, spec.table, set.name
                )));
            }
            warn!(
                "{}: reference '{}' used by '{}' is not remembered by any table",
                set.name, name, spec.table
            );
        }
    }
    Ok(())
}

fn dependency_order(set: &MigrationSet) -> Result<Vec<&TableSpec>> {
    let tables = &set.tables;

    let mut producers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, spec) in tables.iter().enumerate() {
        for name in spec.produced_references() {
            producers.entry(name).or_default().push(index);
        }
    }

    // edges: producer -> consumers
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tables.len()];
    let mut in_degree = vec![0usize; tables.len()];
    for (consumer, spec) in tables.iter().enumerate() {
        for name in spec.consumed_references() {
            for &producer in producers.get(name).into_iter().flatten() {
                if producer != consumer && dependents[producer].insert(consumer) {
                    in_degree[consumer] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(tables.len());
    while let Some(next) = ready.pop_first() {
        ordered.push(&tables[next]);
        for &consumer in &dependents[next] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if ordered.len() < tables.len() {
        let cyclic: Vec<&str> = (0..tables.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| tables[i].table.as_str())
            .collect();
        return Err(SamplerError::Config(format!(
            "Reference cycle between tables of set '{}': {}",
            set.name,
            cyclic.join(", ")
        )));
    }

    Ok(ordered)
}
