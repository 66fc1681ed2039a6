//! Full-table copy.

use async_trait::async_trait;

use super::{Sampler, SamplerContext};
use crate::config::TableSpec;
use crate::core::{FetchRequest, OrderBy, Row};
use crate::error::Result;

/// Copies every source row, honoring only an optional `order_by`.
pub struct CopyAllSampler {
    context: SamplerContext,
    order: Vec<OrderBy>,
}

impl CopyAllSampler {
    pub const NAME: &'static str = "copyall";

    pub fn validate(spec: &TableSpec) -> Result<()> {
        spec.order_terms().map(|_| ())
    }

    pub fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        let order = context.spec.order_terms()?;
        Ok(Box::new(Self { context, order }))
    }
}

#[async_trait]
impl Sampler for CopyAllSampler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn context(&self) -> &SamplerContext {
        &self.context
    }

    async fn sample(&self) -> Result<Vec<Row>> {
        let request = FetchRequest::table(self.context.table()).with_order(self.order.clone());
        self.context.source.fetch_rows(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlValue;
    use crate::sampler::test_support::context_with_rows;

    fn rows() -> Vec<Row> {
        vec![
            Row::new().with("id", 3i64).with("sku", "c"),
            Row::new().with("id", 1i64).with("sku", "a"),
            Row::new().with("id", 2i64).with("sku", "b"),
        ]
    }

    #[tokio::test]
    async fn test_returns_every_row_in_source_order() {
        let (context, _) = context_with_rows(TableSpec::new("products", "copyall"), rows());
        let sampled = CopyAllSampler::build(context).unwrap().sample().await.unwrap();
        assert_eq!(sampled, rows());
    }

    #[tokio::test]
    async fn test_honors_order_by() {
        let mut spec = TableSpec::new("products", "copyall");
        spec.order_by = vec!["id DESC".to_string()];
        let (context, _) = context_with_rows(spec, rows());

        let sampled = CopyAllSampler::build(context).unwrap().sample().await.unwrap();
        let ids: Vec<_> = sampled.iter().map(|r| r.get("id").cloned().unwrap()).collect();
        assert_eq!(ids, vec![SqlValue::I64(3), SqlValue::I64(2), SqlValue::I64(1)]);
    }

    #[test]
    fn test_rejects_bad_order_clause() {
        let mut spec = TableSpec::new("products", "copyall");
        spec.order_by = vec!["id upward".to_string()];
        assert!(CopyAllSampler::validate(&spec).is_err());
    }
}
