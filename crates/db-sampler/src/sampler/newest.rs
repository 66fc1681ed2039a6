//! Most-recent-N copy.

use async_trait::async_trait;

use super::{Sampler, SamplerContext};
use crate::config::TableSpec;
use crate::core::identifier::validate_identifier;
use crate::core::{FetchRequest, OrderBy, Row};
use crate::error::Result;

const DEFAULT_ID_COLUMN: &str = "id";

/// The `limit` rows with the highest `id_column`, newest first.
pub struct NewestSampler {
    context: SamplerContext,
    limit: u64,
    id_column: String,
}

impl NewestSampler {
    pub const NAME: &'static str = "newest";

    fn id_column(spec: &TableSpec) -> &str {
        spec.id_column.as_deref().unwrap_or(DEFAULT_ID_COLUMN)
    }

    pub fn validate(spec: &TableSpec) -> Result<()> {
        spec.demand_limit(Self::NAME)?;
        validate_identifier(Self::id_column(spec))
    }

    pub fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        Self::validate(&context.spec)?;
        let limit = context.spec.demand_limit(Self::NAME)?;
        let id_column = Self::id_column(&context.spec).to_string();
        Ok(Box::new(Self {
            context,
            limit,
            id_column,
        }))
    }
}

#[async_trait]
impl Sampler for NewestSampler {
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
            .with_order(vec![OrderBy::desc(self.id_column.clone())])
            .with_limit(Some(self.limit));
        let mut rows = self.context.source.fetch_rows(&request).await?;
        rows.truncate(usize::try_from(self.limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}
