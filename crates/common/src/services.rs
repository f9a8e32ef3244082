//! Collaborators consumed by the pipeline.
//!
//! - **[`IndexClient`]**: the metadata index, source of truth for the hierarchy
//! - **[`ObjectClient`]**: one object-store client, bound to a branch
//! - **[`KeyManager`]**: key-management service, only asked for plaintext sizes
//!
//! Implementations own their own retry policy; errors surface as [`Error`](crate::Error).

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ByteStream, GetRequestData, ListObjectPartsResult, MultipartObjectPart, ObjectInfo,
};
use crate::node::Node;

#[async_trait]
pub trait IndexClient: Send + Sync + Debug {
    /// Create a node. An existing entry at the same path or uuid is
    ///  updated when `update_if_exists` is set, otherwise the call fails
    ///  with a conflict.
    async fn create_node(&self, node: &Node, update_if_exists: bool) -> Result<Node>;

    /// Read a node by uuid when it carries one, by path otherwise
    async fn read_node(&self, node: &Node) -> Result<Node>;

    /// Delete a node, returns whether an entry was removed
    async fn delete_node(&self, node: &Node) -> Result<bool>;
}

#[async_trait]
pub trait ObjectClient: Send + Sync + Debug {
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo>;

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        request: &GetRequestData,
    ) -> Result<ByteStream>;

    /// Store a whole object, returns the stored object's statistics
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo>;

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy. The metadata directive in `metadata` decides
    ///  whether the destination keeps the source metadata.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo>;

    /// Source size above which `copy_object` is refused, 0 when unlimited
    fn copy_object_multipart_threshold(&self) -> i64;

    /// Server-side copy performed part by part, for sources above the threshold
    async fn copy_object_multipart(
        &self,
        src: &ObjectInfo,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    async fn new_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String>;

    async fn put_object_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        size: i64,
    ) -> Result<MultipartObjectPart>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo>;

    async fn list_object_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
        -> Result<()>;
}

#[async_trait]
pub trait KeyManager: Send + Sync + Debug {
    /// Plaintext size of an encrypted node, for the given key owner
    async fn plain_size(&self, node_uuid: &str, owner: &str) -> Result<i64>;
}
