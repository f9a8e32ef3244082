use clap::Args;

use common::prelude::Node;

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// File or empty folder to remove, as <datasource>/<path>
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("rm failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("'{0}' is a datasource root")]
    Root(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = Target::parse(&self.path)?;
        if target.is_root() {
            return Err(RmError::Root(target.path));
        }

        let runtime = Runtime::load(ctx).await?;
        let request_ctx = runtime.context(&target)?;
        let removed = runtime
            .pipeline()
            .delete_node(&request_ctx, &Node::new(target.path.clone()))
            .await?;
        if !removed {
            return Err(RmError::NotFound(target.path));
        }

        tracing::info!(path = %target.path, "removed node");
        Ok(format!("Removed {}", target.path))
    }
}
