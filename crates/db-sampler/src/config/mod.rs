//! Configuration loading and validation.

mod ordered;
mod types;
mod validation;

pub use ordered::OrderedMap;
pub use types::*;

use crate::error::{Result, SamplerError};
use crate::sampler::SamplerRegistry;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file, validating samplers against the
    /// built-in registry.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML file, validating samplers against
    /// `registry`.
    pub fn load_with<P: AsRef<Path>>(path: P, registry: &SamplerRegistry) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_with(&content, registry)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with(yaml, &SamplerRegistry::with_builtins())
    }

    /// Parse configuration from a YAML string, validating samplers against
    /// `registry`.
    pub fn from_yaml_with(yaml: &str, registry: &SamplerRegistry) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate(registry)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self, registry: &SamplerRegistry) -> Result<()> {
        validation::validate(self, registry)
    }

    /// Compute a SHA256 hash of the configuration, reported with run results.
    pub fn hash(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Select sets by name, in the order given. An empty selection means
    /// every set, in configuration order.
    pub fn select_sets(&self, names: &[String]) -> Result<Vec<&MigrationSet>> {
        if names.is_empty() {
            return Ok(self.sets.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.sets.iter().find(|s| &s.name == name).ok_or_else(|| {
                    SamplerError::Config(format!(
                        "Unknown set '{}'. Configured sets: {}",
                        name,
                        self.sets
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
source:
  host: src.internal
  database: shop
  user: reader
  password: secret
destination:
  host: localhost
  database: shop_sample
  user: writer
  ssl_mode: disable
migration:
  strict_references: true
sets:
  - name: small
    tables:
      - table: customers
        remember:
          id: customer_ids
      - table: orders
        sampler: matched
        references:
          customer_id: customer_ids
        clean:
          email: email
          notes: "fixed:redacted"
    views: [customer_orders]
  - name: schema-only
    tables:
      - table: audit_log
        sampler: empty
"#;

    #[test]
    fn test_from_yaml_defaults_and_order() {
        let config = Config::from_yaml(YAML).unwrap();

        assert_eq!(config.source.r#type, "postgres");
        assert_eq!(config.source.port(), 5432);
        assert_eq!(config.source.schema, "public");
        assert_eq!(config.source.ssl_mode, "require");
        assert_eq!(config.migration.batch_size, 500);
        assert!(config.migration.strict_references);
        assert_eq!(config.migration.table_order, TableOrder::Dependency);

        let set = &config.sets[0];
        assert_eq!(set.tables[0].sampler, "copyall");
        let orders = set.table("orders").unwrap();
        assert_eq!(
            orders.clean.keys().collect::<Vec<_>>(),
            vec!["email", "notes"]
        );
        assert_eq!(set.views, vec!["customer_orders"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sets.len(), 2);
    }

    #[test]
    fn test_unknown_sampler_fails_at_load() {
        let yaml = YAML.replace("sampler: empty", "sampler: mystery");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("Unrecognised sampler type 'mystery'"));
    }

    #[test]
    fn test_select_sets() {
        let config = Config::from_yaml(YAML).unwrap();

        let all = config.select_sets(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let picked = config.select_sets(&["schema-only".to_string()]).unwrap();
        assert_eq!(picked[0].name, "schema-only");

        let err = config.select_sets(&["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("small, schema-only"));
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Config::from_yaml(YAML).unwrap();
        let b = Config::from_yaml(YAML).unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
        assert_eq!(a.hash().unwrap().len(), 64);
    }
}
