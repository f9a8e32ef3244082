use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::Handler;
use crate::branch::{BranchInfo, Identifier};
use crate::context::RequestContext;
use crate::error::Result;
use crate::meta;
use crate::models::{
    stream_from_bytes, ByteStream, CopyRequestData, GetRequestData, ListObjectPartsResult,
    MultipartObjectPart, MultipartRequestData, ObjectInfo, PutRequestData,
};
use crate::node::{Node, NodeType};
use crate::services::IndexClient;

/// Terminal pipeline stage.
///
/// Performs the byte-level operations against the object-store client bound
///  to each side of the request, and answers plain node reads from the index.
///  It never writes to the index itself.
#[derive(Debug, Clone)]
pub struct Executor {
    index: Arc<dyn IndexClient>,
}

impl Executor {
    pub fn new(index: Arc<dyn IndexClient>) -> Self {
        Self { index }
    }
}

fn merged(ctx: &RequestContext, extra: &HashMap<String, String>) -> HashMap<String, String> {
    let mut metadata = ctx.metadata().clone();
    metadata.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    metadata
}

fn locate<'a>(
    ctx: &'a RequestContext,
    identifier: Identifier,
    node: &Node,
) -> Result<(&'a BranchInfo, String)> {
    let branch = ctx.require_branch(identifier)?;
    let key = branch.object_key(node)?;
    Ok((branch, key))
}

#[async_trait]
impl Handler for Executor {
    async fn read_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        with_object_stats: bool,
    ) -> Result<Node> {
        if !with_object_stats {
            return self.index.read_node(node).await;
        }

        let (branch, key) = locate(ctx, Identifier::In, node)?;
        let info = branch
            .client
            .stat_object(&branch.bucket, &key, ctx.metadata())
            .await?;

        let mut stats = node.clone();
        stats.size = info.size;
        stats.mtime = info.last_modified.timestamp();
        stats.etag = info.etag;
        if stats.node_type == NodeType::Unknown {
            stats.node_type = NodeType::Leaf;
        }
        if stats.mime().is_none() {
            if let Some(content_type) = info.content_type.filter(|c| !c.is_empty()) {
                stats.set_meta(meta::MIME, content_type);
            }
        }
        Ok(stats)
    }

    async fn create_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        _update_if_exists: bool,
    ) -> Result<Node> {
        // collections have no object-store representation
        if !node.is_leaf() {
            return Ok(node.clone());
        }

        let (branch, key) = locate(ctx, Identifier::In, node)?;
        let mut metadata = ctx.metadata().clone();
        if let Some(mime) = node.mime() {
            metadata.insert(meta::CONTENT_TYPE.to_string(), mime.to_string());
        }
        let info = branch
            .client
            .put_object(
                &branch.bucket,
                &key,
                stream_from_bytes(Bytes::new()),
                0,
                &metadata,
            )
            .await?;

        let mut created = node.clone();
        created.size = info.size;
        created.mtime = info.last_modified.timestamp();
        created.etag = info.etag;
        Ok(created)
    }

    async fn delete_node(&self, ctx: &RequestContext, node: &Node) -> Result<bool> {
        if node.node_type == NodeType::Collection {
            return Ok(true);
        }

        let (branch, key) = locate(ctx, Identifier::In, node)?;
        branch.client.remove_object(&branch.bucket, &key).await?;
        tracing::debug!(path = %node.path, key = %key, "removed object");
        Ok(true)
    }

    async fn get_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        request: &GetRequestData,
    ) -> Result<ByteStream> {
        let (branch, key) = locate(ctx, Identifier::In, node)?;
        branch.client.get_object(&branch.bucket, &key, request).await
    }

    async fn put_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        body: ByteStream,
        request: &PutRequestData,
    ) -> Result<i64> {
        let (branch, key) = locate(ctx, Identifier::In, node)?;
        let info = branch
            .client
            .put_object(
                &branch.bucket,
                &key,
                body,
                request.size,
                &merged(ctx, &request.metadata),
            )
            .await?;
        tracing::debug!(path = %node.path, key = %key, size = info.size, "stored object");
        Ok(info.size)
    }

    async fn copy_object(
        &self,
        ctx: &RequestContext,
        from: &Node,
        to: &mut Node,
        request: &CopyRequestData,
    ) -> Result<i64> {
        let src_side = if ctx.branch(Identifier::From).is_some() {
            Identifier::From
        } else {
            Identifier::In
        };
        let dst_side = if ctx.branch(Identifier::To).is_some() {
            Identifier::To
        } else {
            Identifier::In
        };
        let (src, src_key) = locate(ctx, src_side, from)?;
        let (dst, dst_key) = locate(ctx, dst_side, to)?;

        let mut metadata = merged(ctx, &request.metadata);
        if let Some(version) = request.src_version_id.as_ref().filter(|v| !v.is_empty()) {
            metadata.insert(meta::COPY_SOURCE_VERSION_ID.to_string(), version.clone());
        }

        if Arc::ptr_eq(&src.client, &dst.client) {
            let info = src
                .client
                .copy_object(&src.bucket, &src_key, &dst.bucket, &dst_key, &metadata)
                .await?;
            return Ok(info.size);
        }

        // different backends: stream the source into the destination
        let source = src
            .client
            .stat_object(&src.bucket, &src_key, ctx.metadata())
            .await?;
        let body = src
            .client
            .get_object(&src.bucket, &src_key, &GetRequestData::default())
            .await?;
        if let Some(content_type) = source.content_type {
            metadata
                .entry(meta::CONTENT_TYPE.to_string())
                .or_insert(content_type);
        }
        let info = dst
            .client
            .put_object(&dst.bucket, &dst_key, body, source.size, &metadata)
            .await?;
        Ok(info.size)
    }

    async fn multipart_create(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        request: &MultipartRequestData,
    ) -> Result<String> {
        let (branch, key) = locate(ctx, Identifier::In, target)?;
        branch
            .client
            .new_multipart_upload(&branch.bucket, &key, &merged(ctx, &request.metadata))
            .await
    }

    async fn multipart_put_object_part(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        request: &PutRequestData,
    ) -> Result<MultipartObjectPart> {
        let (branch, key) = locate(ctx, Identifier::In, target)?;
        branch
            .client
            .put_object_part(
                &branch.bucket,
                &key,
                upload_id,
                part_number,
                body,
                request.size,
            )
            .await
    }

    async fn multipart_complete(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo> {
        let (branch, key) = locate(ctx, Identifier::In, target)?;
        branch
            .client
            .complete_multipart_upload(&branch.bucket, &key, upload_id, parts)
            .await
    }

    async fn multipart_list_object_parts(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult> {
        let (branch, key) = locate(ctx, Identifier::In, target)?;
        branch
            .client
            .list_object_parts(&branch.bucket, &key, upload_id, part_number_marker, max_parts)
            .await
    }

    async fn multipart_abort(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        _request: &MultipartRequestData,
    ) -> Result<()> {
        let (branch, key) = locate(ctx, Identifier::In, target)?;
        branch
            .client
            .abort_multipart_upload(&branch.bucket, &key, upload_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::StorageMode;
    use crate::models::collect_stream;
    use crate::testkit::{MemoryIndex, MemoryObjectClient};

    fn setup() -> (Executor, Arc<MemoryObjectClient>, RequestContext) {
        let client = Arc::new(MemoryObjectClient::new());
        let branch = BranchInfo::new("pydata", "data", client.clone());
        let ctx = RequestContext::new().with_branch(Identifier::In, branch);
        (Executor::new(Arc::new(MemoryIndex::new())), client, ctx)
    }

    #[tokio::test]
    async fn test_put_then_read_with_stats() {
        let (executor, _, ctx) = setup();
        let mut node = Node::new("pydata/notes/todo.txt");
        let request = PutRequestData::new(5).with_meta(meta::CONTENT_TYPE, "text/plain");

        let size = executor
            .put_object(&ctx, &mut node, stream_from_bytes(b"hello".to_vec()), &request)
            .await
            .unwrap();
        assert_eq!(size, 5);

        let stats = executor.read_node(&ctx, &node, true).await.unwrap();
        assert_eq!(stats.size, 5);
        assert_eq!(stats.etag, "5d41402abc4b2a76b9719d911017c592");
        assert!(stats.is_leaf());
        assert_eq!(stats.mime(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_ranged_get() {
        let (executor, _, ctx) = setup();
        let mut node = Node::leaf("pydata/a.txt");
        executor
            .put_object(
                &ctx,
                &mut node,
                stream_from_bytes(b"0123456789".to_vec()),
                &PutRequestData::new(10),
            )
            .await
            .unwrap();

        let body = executor
            .get_object(&ctx, &mut node, &GetRequestData::range(2, 3))
            .await
            .unwrap();
        assert_eq!(collect_stream(body).await.unwrap().as_ref(), b"234");
    }

    #[tokio::test]
    async fn test_copy_across_clients_streams_data() {
        let (executor, _, ctx) = setup();
        let other = Arc::new(MemoryObjectClient::new());
        let to_branch =
            BranchInfo::new("flat", "objects", other.clone()).with_mode(StorageMode::Flat);
        let from_branch = ctx.require_branch(Identifier::In).unwrap().clone();
        let ctx = ctx
            .with_branch(Identifier::From, from_branch)
            .with_branch(Identifier::To, to_branch);

        let mut from = Node::leaf("pydata/a.txt");
        executor
            .put_object(
                &ctx,
                &mut from,
                stream_from_bytes(b"payload".to_vec()),
                &PutRequestData::new(7),
            )
            .await
            .unwrap();

        let mut to = Node::leaf("flat/a.txt").with_uuid("u-1");
        let size = executor
            .copy_object(&ctx, &from, &mut to, &CopyRequestData::default())
            .await
            .unwrap();
        assert_eq!(size, 7);
        assert_eq!(other.object_data("objects", "u-1").unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_collection_has_no_blob() {
        let (executor, client, ctx) = setup();
        let dir = Node::collection("pydata/photos");

        executor.create_node(&ctx, &dir, false).await.unwrap();
        assert!(executor.delete_node(&ctx, &dir).await.unwrap());
        assert!(client.calls().is_empty());
    }
}
