use clap::Args;

use common::prelude::Node;

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Folder to create, as <datasource>/<path>
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MkdirError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("mkdir failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("'{0}' is a datasource root")]
    Root(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Mkdir {
    type Error = MkdirError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = Target::parse(&self.path)?;
        if target.is_root() {
            return Err(MkdirError::Root(target.path));
        }

        let runtime = Runtime::load(ctx).await?;
        let request = runtime.context(&target)?;
        let folder = runtime
            .pipeline()
            .create_node(&request, &Node::collection(target.path.clone()), false)
            .await?;

        Ok(format!("Created folder {} ({})", folder.path, folder.uuid))
    }
}
