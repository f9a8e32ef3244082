use std::path::PathBuf;

use clap::Args;

use common::meta;
use common::models::stream_from_bytes;
use common::prelude::{Node, PutRequestData};

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination, as <datasource>/<path>
    pub dest: String,

    /// Content type (guessed from the file name by default)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("put failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("'{0}' is a datasource root")]
    Root(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = Target::parse(&self.dest)?;
        if target.is_root() {
            return Err(PutError::Root(target.path));
        }

        let data = tokio::fs::read(&self.source)
            .await
            .map_err(|e| PutError::Read(self.source.clone(), e))?;
        let content_type = self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.source)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let runtime = Runtime::load(ctx).await?;
        let request_ctx = runtime.context(&target)?;
        let request =
            PutRequestData::new(data.len() as i64).with_meta(meta::CONTENT_TYPE, content_type);

        let mut node = Node::leaf(target.path.clone());
        let written = runtime
            .pipeline()
            .put_object(&request_ctx, &mut node, stream_from_bytes(data), &request)
            .await?;

        tracing::info!(path = %node.path, uuid = %node.uuid, size = written, "uploaded file");

        let mut output = format!("Uploaded {} ({} bytes)", node.path, written);
        if !node.uuid.is_empty() {
            output.push_str(&format!("\n  uuid: {}", node.uuid));
        }
        Ok(output)
    }
}
