use clap::Args;

use common::prelude::{CopyRequestData, Identifier, Node, RequestContext};

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Cp {
    /// Source file, as <datasource>/<path>
    pub source: String,

    /// Destination, as <datasource>/<path>; must not exist yet
    pub dest: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CpError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("copy failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("'{0}' is a folder, only files can be copied")]
    Folder(String),
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' is a datasource root")]
    Root(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Cp {
    type Error = CpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let from = Target::parse(&self.source)?;
        let to = Target::parse(&self.dest)?;
        if to.is_root() {
            return Err(CpError::Root(to.path));
        }

        let runtime = Runtime::load(ctx).await?;
        let pipeline = runtime.pipeline();

        // flat datasources answer from the index, others from the blob itself
        let from_ctx = runtime.context(&from)?;
        let from_flat = from_ctx.is_flat(Identifier::In);
        let source = pipeline
            .read_node(&from_ctx, &Node::new(from.path.clone()), !from_flat)
            .await?;
        if !source.is_leaf() {
            return Err(CpError::Folder(from.path));
        }

        let to_ctx = runtime.context(&to)?;
        let to_flat = to_ctx.is_flat(Identifier::In);
        match pipeline
            .read_node(&to_ctx, &Node::new(to.path.clone()), !to_flat)
            .await
        {
            Ok(_) => return Err(CpError::AlreadyExists(to.path)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let copy_ctx: RequestContext = runtime.copy_context(&from, &to)?;
        let mut dest = Node::leaf(to.path.clone());
        let copied = pipeline
            .copy_object(&copy_ctx, &source, &mut dest, &CopyRequestData::default())
            .await?;

        tracing::info!(from = %source.path, to = %dest.path, uuid = %dest.uuid, size = copied, "copied file");

        let mut output = format!("Copied {} to {} ({} bytes)", source.path, dest.path, copied);
        if !dest.uuid.is_empty() {
            output.push_str(&format!("\n  uuid: {}", dest.uuid));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::op::{Op, OpContext};
    use crate::ops::{Cat, Init, Put, Rm, Stat};

    async fn init(dir: &Path) -> OpContext {
        let ctx = OpContext::new(Some(dir.join("state")));
        Init {
            datasource: "pydata".into(),
            bucket: "objects".into(),
            hierarchical: false,
            multipart_copy_threshold: 0,
            log_level: "info".into(),
        }
        .execute(&ctx)
        .await
        .unwrap();
        ctx
    }

    async fn put(ctx: &OpContext, dir: &Path, dest: &str, content: &str) {
        let source = dir.join("upload.txt");
        std::fs::write(&source, content).unwrap();
        Put {
            source,
            dest: dest.into(),
            content_type: None,
        }
        .execute(ctx)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_copy_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = init(dir.path()).await;
        put(&ctx, dir.path(), "pydata/a.txt", "hello").await;

        let cp = Cp {
            source: "pydata/a.txt".into(),
            dest: "pydata/b.txt".into(),
        };
        let output = cp.execute(&ctx).await.unwrap();
        assert!(output.starts_with("Copied pydata/a.txt to pydata/b.txt (5 bytes)"));

        let err = cp.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, CpError::AlreadyExists(path) if path == "pydata/b.txt"));

        let copy = Cat {
            path: "pydata/b.txt".into(),
            offset: 1,
            length: Some(3),
        }
        .execute(&ctx)
        .await
        .unwrap();
        assert_eq!(copy, "File: pydata/b.txt\nSize: 3 bytes\n\nell");
    }

    #[tokio::test]
    async fn test_copy_refuses_folders() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = init(dir.path()).await;
        crate::ops::Mkdir {
            path: "pydata/photos".into(),
        }
        .execute(&ctx)
        .await
        .unwrap();

        let err = Cp {
            source: "pydata/photos".into(),
            dest: "pydata/copy".into(),
        }
        .execute(&ctx)
        .await
        .unwrap_err();
        assert!(matches!(err, CpError::Folder(_)));
    }

    #[tokio::test]
    async fn test_stat_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = init(dir.path()).await;
        put(&ctx, dir.path(), "pydata/notes/a.txt", "hello").await;

        let stat = Stat {
            path: "pydata/notes/a.txt".into(),
        }
        .execute(&ctx)
        .await
        .unwrap();
        let node: serde_json::Value = serde_json::from_str(&stat).unwrap();
        assert_eq!(node["type"], "leaf");
        assert_eq!(node["size"], 5);
        assert_eq!(node["etag"], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(node["meta"]["mime"], "text/plain");

        let rm = Rm {
            path: "pydata/notes/a.txt".into(),
        };
        assert_eq!(rm.execute(&ctx).await.unwrap(), "Removed pydata/notes/a.txt");
        let err = Stat {
            path: "pydata/notes/a.txt".into(),
        }
        .execute(&ctx)
        .await
        .unwrap_err();
        assert!(matches!(err, crate::ops::stat::StatError::Pipeline(e) if e.is_not_found()));
    }
}
