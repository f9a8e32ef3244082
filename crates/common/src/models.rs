//! Request and response shapes of the file-operation contract.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::meta;

/// Object body, streamed in chunks.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Wrap an in-memory buffer as a single-chunk stream
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data: Bytes = data.into();
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Drain a stream into a contiguous buffer
pub async fn collect_stream(body: ByteStream) -> std::io::Result<Bytes> {
    let chunks: Vec<Bytes> = body.try_collect().await?;
    Ok(chunks.concat().into())
}

#[derive(Debug, Clone, Default)]
pub struct GetRequestData {
    pub start_offset: u64,
    /// Bytes to read from `start_offset`, everything when `None`
    pub length: Option<u64>,
    pub version_id: Option<String>,
}

impl GetRequestData {
    pub fn range(start_offset: u64, length: u64) -> Self {
        Self {
            start_offset,
            length: Some(length),
            version_id: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.start_offset == 0 && self.length.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutRequestData {
    /// Declared body size, -1 when unknown
    pub size: i64,
    pub metadata: HashMap<String, String>,
}

impl PutRequestData {
    pub fn new(size: i64) -> Self {
        Self {
            size,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.metadata
            .get(meta::CONTENT_TYPE)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyRequestData {
    pub metadata: HashMap<String, String>,
    /// Set when restoring a stored version rather than copying a live node
    pub src_version_id: Option<String>,
}

impl CopyRequestData {
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_version_restore(&self) -> bool {
        self.src_version_id.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Moves are copies that keep the source metadata and identity
    pub fn is_move(&self) -> bool {
        self.metadata
            .get(meta::METADATA_DIRECTIVE)
            .is_some_and(|d| d == meta::DIRECTIVE_COPY)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultipartRequestData {
    pub metadata: HashMap<String, String>,
}

/// Object statistics as reported by the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub etag: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartObjectPart {
    pub part_number: u32,
    pub etag: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListObjectPartsResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub part_number_marker: u32,
    pub next_part_number_marker: u32,
    pub max_parts: u32,
    pub is_truncated: bool,
    pub parts: Vec<MultipartObjectPart>,
}
