//! Schema-only copy.

use async_trait::async_trait;

use super::{Sampler, SamplerContext};
use crate::config::TableSpec;
use crate::core::Row;
use crate::error::Result;

/// Produces no rows. The table is still recreated on the destination, so
/// this is how a set carries a table's structure without its data.
pub struct CopyEmptySampler {
    context: SamplerContext,
}

impl CopyEmptySampler {
    pub const NAME: &'static str = "empty";

    pub fn validate(_spec: &TableSpec) -> Result<()> {
        Ok(())
    }

    pub fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        Ok(Box::new(Self { context }))
    }
}

#[async_trait]
impl Sampler for CopyEmptySampler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn context(&self) -> &SamplerContext {
        &self.context
    }

    async fn sample(&self) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::test_support::context_with_rows;

    #[tokio::test]
    async fn test_never_queries_source() {
        let (context, source) = context_with_rows(
            TableSpec::new("audit_log", "empty"),
            vec![Row::new().with("id", 1i64)],
        );
        let rows = CopyEmptySampler::build(context).unwrap().execute().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(source.fetch_count(), 0);
    }
}
