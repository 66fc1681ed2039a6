//! Reference-filtered copy.
//!
//! Keeps only the rows related to rows already sampled from other tables:
//!
//! ```yaml
//! - table: orders
//!   sampler: matched
//!   references: { customer_id: customer_ids }
//!   constraints: { status: [paid, shipped] }
//!   where: ["total > 0"]
//!   limit: 1000
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Sampler, SamplerContext};
use crate::config::TableSpec;
use crate::core::identifier::{validate_identifier, validate_predicate};
use crate::core::{FetchRequest, OrderBy, Row, SqlValue};
use crate::error::{Result, SamplerError};

/// Rows matching every configured reference, constraint and predicate.
pub struct MatchedSampler {
    context: SamplerContext,
    order: Vec<OrderBy>,
    constraints: Vec<(String, Vec<SqlValue>)>,
}

impl MatchedSampler {
    pub const NAME: &'static str = "matched";

    pub fn validate(spec: &TableSpec) -> Result<()> {
        if spec.references.is_empty() && spec.constraints.is_empty() && spec.where_clauses.is_empty()
        {
            return Err(SamplerError::Config(format!(
                "'references', 'constraints' or 'where' missing from config of table '{}' required by {}",
                spec.table,
                Self::NAME
            )));
        }
        for column in spec.references.keys().chain(spec.constraints.keys()) {
            validate_identifier(column)?;
        }
        for name in spec.consumed_references() {
            if name.is_empty() {
                return Err(SamplerError::Config(format!(
                    "Empty reference name in config of table '{}'",
                    spec.table
                )));
            }
        }
        for predicate in &spec.where_clauses {
            validate_predicate(predicate)?;
        }
        spec.order_terms().map(|_| ())
    }

    pub fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        Self::validate(&context.spec)?;
        let order = context.spec.order_terms()?;
        let constraints = context
            .spec
            .constraints
            .iter()
            .map(|(column, values)| (column.to_string(), values.to_sql_values()))
            .collect();
        Ok(Box::new(Self {
            context,
            order,
            constraints,
        }))
    }

    /// Resolve `references` into column filters.
    ///
    /// `Ok(None)` means the sample is known to be empty without asking the
    /// source: a reference was never populated (lenient mode) or was populated
    /// with no values.
    fn reference_filters(&self) -> Result<Option<Vec<(String, Vec<SqlValue>)>>> {
        let store = &self.context.references;
        let mut filters = Vec::with_capacity(self.context.spec.references.len());

        for (column, name) in self.context.spec.references.iter() {
            if !store.contains(name) {
                if self.context.strict_references {
                    return Err(SamplerError::Config(format!(
                        "Reference '{}' required by table '{}' has not been populated",
                        name,
                        self.context.table()
                    )));
                }
                warn!(
                    "{}: reference '{}' has not been populated, sampling no rows",
                    self.context.table(),
                    name
                );
                return Ok(None);
            }

            let values = distinct(store.lookup(name));
            if values.is_empty() {
                debug!(
                    "{}: reference '{}' is empty, sampling no rows",
                    self.context.table(),
                    name
                );
                return Ok(None);
            }
            filters.push((column.to_string(), values));
        }

        Ok(Some(filters))
    }
}

/// Drop duplicate and NULL values, keeping first occurrences in order.
fn distinct(values: Vec<SqlValue>) -> Vec<SqlValue> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| match v.to_text() {
            Some(text) => seen.insert((v.null_type(), text)),
            None => false,
        })
        .collect()
}

#[async_trait]
impl Sampler for MatchedSampler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn context(&self) -> &SamplerContext {
        &self.context
    }

    async fn sample(&self) -> Result<Vec<Row>> {
        let Some(reference_filters) = self.reference_filters()? else {
            return Ok(Vec::new());
        };
        if self.context.spec.limit == Some(0)
            || self.constraints.iter().any(|(_, values)| values.is_empty())
        {
            return Ok(Vec::new());
        }

        let mut request = FetchRequest::table(self.context.table())
            .with_where(self.context.spec.where_clauses.iter().cloned())
            .with_order(self.order.clone())
            .with_limit(self.context.spec.limit);
        for (column, values) in reference_filters.into_iter().chain(self.constraints.iter().cloned()) {
            request = request.with_filter(column, values);
        }

        self.context.source.fetch_rows(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigScalar, ConstraintValues, OrderedMap};
    use crate::sampler::test_support::context_with_rows;

    fn orders() -> Vec<Row> {
        vec![
            Row::new().with("id", 10i64).with("customer_id", 1i64).with("status", "paid"),
            Row::new().with("id", 11i64).with("customer_id", 3i64).with("status", "paid"),
            Row::new().with("id", 12i64).with("customer_id", 1i64).with("status", "void"),
        ]
    }

    fn spec() -> TableSpec {
        let mut spec = TableSpec::new("orders", "matched");
        spec.references = OrderedMap::from_iter([("customer_id", "customer_ids".to_string())]);
        spec
    }

    #[tokio::test]
    async fn test_filters_by_remembered_values() {
        let (context, _) = context_with_rows(spec(), orders());
        context
            .references
            .remember("customer_ids", vec![SqlValue::I64(1), SqlValue::I64(2)]);

        let rows = MatchedSampler::build(context).unwrap().sample().await.unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![SqlValue::I64(10), SqlValue::I64(12)]);
    }

    #[tokio::test]
    async fn test_matches_across_integer_widths() {
        let (context, _) = context_with_rows(spec(), orders());
        context.references.remember("customer_ids", vec![SqlValue::I32(3)]);

        let rows = MatchedSampler::build(context).unwrap().sample().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&SqlValue::I64(11)));
    }

    #[tokio::test]
    async fn test_unpopulated_reference_is_empty_when_lenient() {
        let (context, source) = context_with_rows(spec(), orders());

        let rows = MatchedSampler::build(context).unwrap().sample().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unpopulated_reference_fails_when_strict() {
        let (mut context, _) = context_with_rows(spec(), orders());
        context.strict_references = true;

        let err = MatchedSampler::build(context).unwrap().sample().await.unwrap_err();
        assert!(matches!(err, SamplerError::Config(_)));
        assert!(err.to_string().contains("customer_ids"));
    }

    #[tokio::test]
    async fn test_empty_reference_skips_source() {
        let (mut context, source) = context_with_rows(spec(), orders());
        context.strict_references = true;
        context.references.remember("customer_ids", Vec::new());

        let rows = MatchedSampler::build(context).unwrap().sample().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_constraints_and_limit() {
        let mut spec = spec();
        spec.constraints = OrderedMap::from_iter([(
            "status",
            ConstraintValues::One(ConfigScalar::Text("paid".into())),
        )]);
        spec.limit = Some(1);
        let (context, _) = context_with_rows(spec, orders());
        context
            .references
            .remember("customer_ids", vec![SqlValue::I64(1), SqlValue::I64(3)]);

        let rows = MatchedSampler::build(context).unwrap().sample().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&SqlValue::I64(10)));
    }

    #[test]
    fn test_requires_some_filter() {
        let err = MatchedSampler::validate(&TableSpec::new("orders", "matched")).unwrap_err();
        assert!(err.to_string().contains("missing from config"));
    }

    #[test]
    fn test_rejects_unsafe_where() {
        let mut spec = TableSpec::new("orders", "matched");
        spec.where_clauses = vec!["1=1; DROP TABLE orders".to_string()];
        assert!(MatchedSampler::validate(&spec).is_err());
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let values = distinct(vec![
            SqlValue::I64(2),
            SqlValue::I64(1),
            SqlValue::I64(2),
            SqlValue::Null(crate::core::SqlNullType::I64),
        ]);
        assert_eq!(values, vec![SqlValue::I64(2), SqlValue::I64(1)]);
    }
}
