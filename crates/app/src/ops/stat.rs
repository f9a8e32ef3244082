use clap::Args;

use common::prelude::{Identifier, Node};

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Stat {
    /// Node to describe, as <datasource>/<path>
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("stat failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("failed to render node: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Stat {
    type Error = StatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = Target::parse(&self.path)?;
        let runtime = Runtime::load(ctx).await?;
        let request_ctx = runtime.context(&target)?;
        let pipeline = runtime.pipeline();

        let lookup = Node::new(target.path.clone());
        let node = if request_ctx.is_flat(Identifier::In) {
            // folders only exist in the index, leaves get fresh object stats
            let indexed = pipeline.read_node(&request_ctx, &lookup, false).await?;
            if indexed.is_leaf() {
                pipeline.read_node(&request_ctx, &indexed, true).await?
            } else {
                indexed
            }
        } else {
            pipeline.read_node(&request_ctx, &lookup, true).await?
        };

        Ok(serde_json::to_string_pretty(&node)?)
    }
}
