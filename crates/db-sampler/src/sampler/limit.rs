//! First-N copy.

use async_trait::async_trait;

use super::{Sampler, SamplerContext};
use crate::config::TableSpec;
use crate::core::{FetchRequest, OrderBy, Row};
use crate::error::Result;

/// At most `limit` rows, in source order unless `order_by` is given.
pub struct LimitSampler {
    context: SamplerContext,
    limit: u64,
    order: Vec<OrderBy>,
}

impl LimitSampler {
    pub const NAME: &'static str = "limit";

    pub fn validate(spec: &TableSpec) -> Result<()> {
        spec.demand_limit(Self::NAME)?;
        spec.order_terms().map(|_| ())
    }

    pub fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        let limit = context.spec.demand_limit(Self::NAME)?;
        let order = context.spec.order_terms()?;
        Ok(Box::new(Self {
            context,
            limit,
            order,
        }))
    }
}

#[async_trait]
impl Sampler for LimitSampler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn context(&self) -> &SamplerContext {
        &self.context
    }

    async fn sample(&self) -> Result<Vec<Row>> {
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let request = FetchRequest::table(self.context.table())
            .with_order(self.order.clone())
            .with_limit(Some(self.limit));
        let mut rows = self.context.source.fetch_rows(&request).await?;
        // The bound holds whatever the driver did with LIMIT.
        rows.truncate(usize::try_from(self.limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}
