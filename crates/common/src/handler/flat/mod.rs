//! Flat-storage reconciliation.
//!
//! Flat datasources key blobs by node uuid, so the object store knows
//!  nothing about the hierarchy. This stage keeps the index coherent with
//!  such a store: it resolves identities before blobs are addressed, guards
//!  folder operations that only concern the index, reserves identities ahead
//!  of writes and synchronizes the index entry from the authoritative object
//!  statistics once a write succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::Handler;
use crate::branch::{EncryptionMode, Identifier};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::meta;
use crate::models::{
    ByteStream, CopyRequestData, GetRequestData, ListObjectPartsResult, MultipartObjectPart,
    MultipartRequestData, ObjectInfo, PutRequestData,
};
use crate::node::{Node, NodeType};
use crate::services::{IndexClient, KeyManager};

mod copy;
mod etag;
mod sync;

pub use copy::CopyState;
pub use etag::recompute_etag;

#[derive(Debug, Clone)]
pub struct FlatStorageHandler {
    next: Arc<dyn Handler>,
    index: Arc<dyn IndexClient>,
    keys: Arc<dyn KeyManager>,
}

impl FlatStorageHandler {
    pub fn new(
        next: Arc<dyn Handler>,
        index: Arc<dyn IndexClient>,
        keys: Arc<dyn KeyManager>,
    ) -> Self {
        Self { next, index, keys }
    }

    /// Populate the uuid of a node addressed by path.
    ///
    /// No-op, and no lookup, when the node already carries a uuid.
    pub async fn resolve_identity(&self, ctx: &RequestContext, node: &mut Node) -> Result<()> {
        if !node.uuid.is_empty() {
            return Ok(());
        }
        let resolved = self.next.read_node(ctx, node, false).await?;
        if resolved.uuid.is_empty() {
            return Err(Error::MissingIdentity(node.path.clone()));
        }
        tracing::debug!(path = %node.path, uuid = %resolved.uuid, "resolved node identity");
        node.uuid = resolved.uuid;
        Ok(())
    }

    /// Make sure a node about to be written has an identity.
    ///
    /// Resolves it from the index, or reserves a temporary entry when the
    ///  index has none; a folder at the path is a conflict. The reservation
    ///  is returned so that the caller can revert it if the write fails.
    async fn reserve_identity(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        metadata: &HashMap<String, String>,
        mime: Option<&str>,
    ) -> Result<Option<Node>> {
        if !node.uuid.is_empty() {
            return Ok(None);
        }
        match self.next.read_node(ctx, node, false).await {
            Ok(existing) if existing.node_type == NodeType::Collection => {
                Err(Error::Conflict(format!(
                    "cannot write a file on top of an existing folder at '{}'",
                    node.path
                )))
            }
            Ok(existing) if existing.uuid.is_empty() => {
                Err(Error::MissingIdentity(node.path.clone()))
            }
            Ok(existing) => {
                node.uuid = existing.uuid;
                Ok(None)
            }
            Err(err) if err.is_not_found() => {
                let temporary = copy::temporary_node(None, node, metadata, mime);
                let created = self.index.create_node(&temporary, false).await?;
                tracing::debug!(path = %created.path, uuid = %created.uuid, "reserved temporary node");
                node.uuid = created.uuid.clone();
                Ok(Some(created))
            }
            Err(err) => Err(err),
        }
    }

    /// Compensate a reservation after a failed write. The outcome is only
    ///  logged; the write error is what the caller gets.
    async fn revert(&self, temporary: &Node, cause: &Error) {
        match self.index.delete_node(temporary).await {
            Ok(_) => tracing::warn!(
                path = %temporary.path,
                uuid = %temporary.uuid,
                error = %cause,
                "write failed, reverted temporary index node"
            ),
            Err(revert_err) => tracing::error!(
                path = %temporary.path,
                uuid = %temporary.uuid,
                error = %cause,
                revert_error = %revert_err,
                "write failed and temporary index node could not be reverted"
            ),
        }
    }

    /// Index entry of `target` while it is still a reservation, i.e. no
    /// write has been synchronized into it yet.
    async fn pending_reservation(&self, target: &Node) -> Option<Node> {
        let lookup = Node::new(target.path.clone()).with_uuid(target.uuid.clone());
        match self.index.read_node(&lookup).await {
            Ok(entry) if entry.is_temporary() => Some(entry),
            Ok(_) => None,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                tracing::warn!(
                    path = %target.path,
                    uuid = %target.uuid,
                    error = %err,
                    "could not check index entry for a pending reservation"
                );
                None
            }
        }
    }

    async fn sync(
        &self,
        ctx: &RequestContext,
        identifier: Identifier,
        node: &Node,
        metadata: &HashMap<String, String>,
        mime: Option<&str>,
    ) -> Result<Node> {
        sync::post_write_sync(
            self.next.as_ref(),
            self.index.as_ref(),
            ctx,
            identifier,
            node,
            metadata,
            mime,
        )
        .await
    }

    async fn plain_size(&self, uuid: &str, datasource: &str) -> Result<i64> {
        let owner = format!("{}{}", meta::DATASOURCE_OWNER_PREFIX, datasource);
        self.keys.plain_size(uuid, &owner).await
    }

    /// Settle a write made under an identity reservation: the index entry
    ///  is synchronized when it succeeded, the reservation reverted when it
    ///  failed.
    async fn finish_write<T: Send>(
        &self,
        ctx: &RequestContext,
        node: &Node,
        reserved: Option<Node>,
        written: Result<T>,
        metadata: &HashMap<String, String>,
        mime: Option<&str>,
    ) -> Result<(T, Node)> {
        match written {
            Ok(out) => {
                // the blob exists under the reserved uuid; a sync failure keeps it
                let synced = self
                    .sync(ctx, Identifier::In, node, metadata, mime)
                    .await?;
                Ok((out, synced))
            }
            Err(err) => {
                if let Some(temporary) = reserved {
                    self.revert(&temporary, &err).await;
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Handler for FlatStorageHandler {
    async fn read_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        with_object_stats: bool,
    ) -> Result<Node> {
        if with_object_stats && ctx.is_flat(Identifier::In) && node.uuid.is_empty() {
            let mut node = node.clone();
            self.resolve_identity(ctx, &mut node).await?;
            return self.next.read_node(ctx, &node, true).await;
        }
        self.next.read_node(ctx, node, with_object_stats).await
    }

    async fn create_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        update_if_exists: bool,
    ) -> Result<Node> {
        if !ctx.is_flat(Identifier::In) {
            return self.next.create_node(ctx, node, update_if_exists).await;
        }

        if node.is_leaf() {
            // leaves take the regular write path
            let mut leaf = node.clone();
            let no_meta = HashMap::new();
            let reserved = self
                .reserve_identity(ctx, &mut leaf, &no_meta, node.mime())
                .await?;
            let written = self.next.create_node(ctx, &leaf, update_if_exists).await;
            let (_, synced) = self
                .finish_write(ctx, &leaf, reserved, written, &no_meta, node.mime())
                .await?;
            return Ok(synced);
        }

        let lookup = Node::new(node.path.clone());
        if let Ok(mut existing) = self.next.read_node(ctx, &lookup, false).await {
            if existing.is_leaf() {
                return Err(Error::Conflict(format!(
                    "cannot create a folder on top of an existing file at '{}'",
                    node.path
                )));
            }
            existing.set_meta(meta::INDEXED, true);
            return Ok(existing);
        }

        let mut created = self.index.create_node(node, update_if_exists).await?;
        tracing::debug!(path = %created.path, uuid = %created.uuid, "created folder in index");
        created.set_meta(meta::INDEXED, true);
        Ok(created)
    }

    async fn delete_node(&self, ctx: &RequestContext, node: &Node) -> Result<bool> {
        if !ctx.is_flat(Identifier::In) {
            return self.next.delete_node(ctx, node).await;
        }
        let mut leaf = match node.node_type {
            NodeType::Unknown => self.next.read_node(ctx, node, false).await?,
            _ => node.clone(),
        };
        if !leaf.is_leaf() {
            return self.index.delete_node(&leaf).await;
        }

        self.resolve_identity(ctx, &mut leaf).await?;
        // the index entry only goes once the blob is gone
        if !self.next.delete_node(ctx, &leaf).await? {
            return Ok(false);
        }
        self.index.delete_node(&leaf).await
    }

    async fn get_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        request: &GetRequestData,
    ) -> Result<ByteStream> {
        if ctx.is_flat(Identifier::In) {
            self.resolve_identity(ctx, node).await?;
        }
        self.next.get_object(ctx, node, request).await
    }

    async fn put_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        body: ByteStream,
        request: &PutRequestData,
    ) -> Result<i64> {
        if !ctx.is_flat(Identifier::In) {
            return self.next.put_object(ctx, node, body, request).await;
        }

        let mime = request.content_type();
        let reserved = self
            .reserve_identity(ctx, node, &request.metadata, mime)
            .await?;
        let written = self.next.put_object(ctx, node, body, request).await;
        let (size, _) = self
            .finish_write(ctx, node, reserved, written, &request.metadata, mime)
            .await?;
        Ok(size)
    }

    async fn copy_object(
        &self,
        ctx: &RequestContext,
        from: &Node,
        to: &mut Node,
        request: &CopyRequestData,
    ) -> Result<i64> {
        if !ctx.is_flat(Identifier::To) {
            return self.next.copy_object(ctx, from, to, request).await;
        }
        self.flat_copy(ctx, from, to, request).await
    }

    async fn multipart_create(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        request: &MultipartRequestData,
    ) -> Result<String> {
        if !ctx.is_flat(Identifier::In) {
            return self.next.multipart_create(ctx, target, request).await;
        }

        let mime = request
            .metadata
            .get(meta::CONTENT_TYPE)
            .map(String::as_str)
            .filter(|m| !m.is_empty());
        let reserved = self
            .reserve_identity(ctx, target, &request.metadata, mime)
            .await?;
        match self.next.multipart_create(ctx, target, request).await {
            Ok(upload_id) => Ok(upload_id),
            Err(err) => {
                if let Some(temporary) = reserved {
                    self.revert(&temporary, &err).await;
                }
                Err(err)
            }
        }
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
        if ctx.is_flat(Identifier::In) {
            self.resolve_identity(ctx, target).await?;
        }
        self.next
            .multipart_put_object_part(ctx, target, upload_id, part_number, body, request)
            .await
    }

    async fn multipart_complete(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo> {
        if !ctx.is_flat(Identifier::In) {
            return self
                .next
                .multipart_complete(ctx, target, upload_id, parts)
                .await;
        }

        self.resolve_identity(ctx, target).await?;
        let info = match self
            .next
            .multipart_complete(ctx, target, upload_id, parts)
            .await
        {
            Ok(info) => info,
            Err(err) => {
                if let Some(temporary) = self.pending_reservation(target).await {
                    self.revert(&temporary, &err).await;
                }
                return Err(err);
            }
        };

        let mut metadata = HashMap::new();
        if target.size == 0 {
            let branch = ctx.require_branch(Identifier::In)?;
            let clear_size = if branch.encryption != EncryptionMode::Clear {
                match self.plain_size(&target.uuid, &branch.name).await {
                    Ok(size) => size,
                    Err(err) => {
                        tracing::warn!(
                            uuid = %target.uuid,
                            datasource = %branch.name,
                            error = %err,
                            fallback = info.size,
                            "could not read plain size from key manager, using stored size"
                        );
                        info.size
                    }
                }
            } else {
                info.size
            };
            metadata.insert(meta::CLEAR_SIZE.to_string(), clear_size.to_string());
        }

        self.sync(ctx, Identifier::In, target, &metadata, None)
            .await?;
        Ok(info)
    }

    async fn multipart_list_object_parts(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult> {
        if ctx.is_flat(Identifier::In) {
            self.resolve_identity(ctx, target).await?;
        }
        self.next
            .multipart_list_object_parts(ctx, target, upload_id, part_number_marker, max_parts)
            .await
    }

    async fn multipart_abort(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        request: &MultipartRequestData,
    ) -> Result<()> {
        if !ctx.is_flat(Identifier::In) {
            return self
                .next
                .multipart_abort(ctx, target, upload_id, request)
                .await;
        }

        self.resolve_identity(ctx, target).await?;
        self.next
            .multipart_abort(ctx, target, upload_id, request)
            .await?;

        // an aborted upload never finalizes the entry reserved for it
        if let Some(temporary) = self.pending_reservation(target).await {
            match self.index.delete_node(&temporary).await {
                Ok(_) => tracing::info!(
                    path = %temporary.path,
                    uuid = %temporary.uuid,
                    upload_id,
                    "upload aborted, removed temporary index node"
                ),
                Err(err) => tracing::error!(
                    path = %temporary.path,
                    uuid = %temporary.uuid,
                    upload_id,
                    error = %err,
                    "upload aborted but temporary index node could not be removed"
                ),
            }
        }
        Ok(())
    }
}
