//! Sampler registry for explicit strategy selection.
//!
//! Maps the `sampler:` identifier of a table to a factory. The registry is
//! constructed explicitly and injected into config validation and the
//! migrator, so custom strategies can be added without global state, and an
//! unknown identifier fails before any table is touched.

use std::collections::HashMap;

use super::{
    CopyAllSampler, CopyEmptySampler, LimitSampler, MatchedSampler, NewestSampler, Sampler,
    SamplerContext,
};
use crate::config::TableSpec;
use crate::error::{Result, SamplerError};

/// Validate and build functions for one strategy.
#[derive(Clone, Copy)]
pub struct SamplerFactory {
    /// Canonical strategy name.
    pub name: &'static str,
    /// Check the table's parameters without touching any database.
    pub validate: fn(&TableSpec) -> Result<()>,
    /// Construct the sampler.
    pub build: fn(SamplerContext) -> Result<Box<dyn Sampler>>,
}

/// Registry of sampling strategies keyed by lowercase identifier.
#[derive(Default, Clone)]
pub struct SamplerRegistry {
    factories: HashMap<String, SamplerFactory>,
}

impl SamplerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in strategies and their aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_all(
            &["copyall", "all", "full", "fullcopy"],
            SamplerFactory {
                name: CopyAllSampler::NAME,
                validate: CopyAllSampler::validate,
                build: CopyAllSampler::build,
            },
        );
        registry.register_all(
            &["empty", "copyempty", "none"],
            SamplerFactory {
                name: CopyEmptySampler::NAME,
                validate: CopyEmptySampler::validate,
                build: CopyEmptySampler::build,
            },
        );
        registry.register_all(
            &["limit", "limited"],
            SamplerFactory {
                name: LimitSampler::NAME,
                validate: LimitSampler::validate,
                build: LimitSampler::build,
            },
        );
        registry.register_all(
            &["matched", "reference", "referenced", "filtered"],
            SamplerFactory {
                name: MatchedSampler::NAME,
                validate: MatchedSampler::validate,
                build: MatchedSampler::build,
            },
        );
        registry.register_all(
            &["newest", "newestbyid"],
            SamplerFactory {
                name: NewestSampler::NAME,
                validate: NewestSampler::validate,
                build: NewestSampler::build,
            },
        );

        registry
    }

    /// Register a strategy under an identifier (case-insensitive).
    ///
    /// Registering an existing identifier replaces it.
    pub fn register(&mut self, id: &str, factory: SamplerFactory) {
        self.factories.insert(id.to_lowercase(), factory);
    }

    fn register_all(&mut self, ids: &[&str], factory: SamplerFactory) {
        for id in ids {
            self.register(id, factory);
        }
    }

    /// Whether an identifier is registered.
    pub fn has(&self, id: &str) -> bool {
        self.factories.contains_key(&id.to_lowercase())
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Look up the factory for a table's sampler, or fail with a
    /// configuration error.
    pub fn require(&self, spec: &TableSpec) -> Result<SamplerFactory> {
        self.factories
            .get(&spec.sampler.to_lowercase())
            .copied()
            .ok_or_else(|| {
                SamplerError::Config(format!(
                    "Unrecognised sampler type '{}' for table '{}'. Known samplers: {}",
                    spec.sampler,
                    spec.table,
                    self.ids().join(", ")
                ))
            })
    }

    /// Check that a table's sampler exists and its parameters are valid.
    pub fn validate(&self, spec: &TableSpec) -> Result<()> {
        (self.require(spec)?.validate)(spec)
    }

    /// Build the sampler for the context's table.
    pub fn build(&self, context: SamplerContext) -> Result<Box<dyn Sampler>> {
        let factory = self.require(&context.spec)?;
        (factory.build)(context)
    }
}
