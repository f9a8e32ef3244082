//! ObjectStore - an S3-semantics object client backed by SQLite + object storage.
//!
//! Object and upload metadata (etags, sizes, user metadata, staged parts) live in
//! SQLite; object bytes live in the configured object storage backend.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use md5::{Digest, Md5};
use tracing::{debug, info, warn};

use common::meta;
use common::models::{
    collect_stream, ByteStream, GetRequestData, ListObjectPartsResult, MultipartObjectPart,
    ObjectInfo,
};
use common::prelude::ObjectClient;

use crate::database::{Database, ObjectRecord, PartRecord, UploadRecord};
use crate::error::{BlobStoreError, Result};
use crate::storage::{ObjectStoreConfig, Storage};

/// Page size used when listing parts without an explicit maximum.
const DEFAULT_MAX_PARTS: u32 = 1000;

/// Object client storing metadata in SQLite and bytes in object storage.
///
/// Etags follow S3: the hex MD5 of the content for single puts and copies,
/// `hex(md5(part digests))-N` for completed multipart uploads and multipart
/// copies.
///
/// # Example
///
/// ```rust,no_run
/// use flatsync_object_store::ObjectStore;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), flatsync_object_store::BlobStoreError> {
/// // Create a local file-based store, refusing single copies above 5 GiB
/// let store = ObjectStore::new_local(Path::new("/tmp/objects"))
///     .await?
///     .with_multipart_copy_threshold(5 * 1024 * 1024 * 1024);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStore {
    db: Database,
    storage: Storage,
    multipart_copy_threshold: i64,
}

impl ObjectStore {
    /// Create a new ObjectStore with the given configuration.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `config` - Object storage configuration (S3, MinIO, local, or memory)
    pub async fn new(db_path: &Path, config: ObjectStoreConfig) -> Result<Self> {
        let db = Database::new(db_path).await?;
        let storage = Storage::new(config).await?;
        Ok(Self {
            db,
            storage,
            multipart_copy_threshold: 0,
        })
    }

    /// Create a new ObjectStore with an in-memory SQLite database.
    pub async fn in_memory(config: ObjectStoreConfig) -> Result<Self> {
        let db = Database::in_memory().await?;
        let storage = Storage::new(config).await?;
        Ok(Self {
            db,
            storage,
            multipart_copy_threshold: 0,
        })
    }

    /// Create a new ObjectStore backed by local filesystem.
    ///
    /// This creates both SQLite DB and object storage in the given directory
    /// (db at data_dir/objects.db, bytes under data_dir/objects/).
    pub async fn new_local(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("objects.db");
        let objects_path = data_dir.join("objects");
        let config = ObjectStoreConfig::Local { path: objects_path };
        Self::new(&db_path, config).await
    }

    /// Create a fully ephemeral ObjectStore (in-memory DB + in-memory object storage).
    ///
    /// Data will be lost when the ObjectStore is dropped. Useful for testing.
    pub async fn new_ephemeral() -> Result<Self> {
        Self::in_memory(ObjectStoreConfig::Memory).await
    }

    /// Refuse single-request copies of sources larger than `threshold` bytes.
    /// Zero disables the limit.
    pub fn with_multipart_copy_threshold(mut self, threshold: i64) -> Self {
        self.multipart_copy_threshold = threshold.max(0);
        self
    }

    async fn record(&self, bucket: &str, key: &str) -> Result<ObjectRecord> {
        self.db
            .get_object(bucket, key)
            .await?
            .ok_or_else(|| BlobStoreError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<UploadRecord> {
        match self.db.get_upload(upload_id).await? {
            Some(upload) if upload.bucket == bucket && upload.key == key => Ok(upload),
            _ => Err(BlobStoreError::NoSuchUpload(upload_id.to_string())),
        }
    }

    /// Hex MD5 of the stored content, reusing the etag when it already is one.
    async fn content_md5(&self, record: &ObjectRecord) -> Result<String> {
        if !is_composite(&record.etag) {
            return Ok(record.etag.clone());
        }
        let mut body = self.storage.get_data(&record.bucket, &record.key, None).await?;
        let mut hasher = Md5::new();
        while let Some(chunk) = body.try_next().await? {
            hasher.update(&chunk);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Copy bytes and write the destination record. Metadata is replaced or
    /// carried over according to the metadata directive.
    async fn copy_with_etag(
        &self,
        source: &ObjectRecord,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
        etag: String,
    ) -> Result<ObjectRecord> {
        self.storage
            .copy_data(&source.bucket, &source.key, dst_bucket, dst_key)
            .await?;

        let replace = metadata
            .get(meta::METADATA_DIRECTIVE)
            .is_some_and(|d| d == meta::DIRECTIVE_REPLACE);
        let (content_type, user) = if replace {
            (
                metadata
                    .get(meta::CONTENT_TYPE)
                    .cloned()
                    .or_else(|| source.content_type.clone()),
                user_metadata(metadata),
            )
        } else {
            (source.content_type.clone(), source.metadata.clone())
        };

        let record = ObjectRecord {
            bucket: dst_bucket.to_string(),
            key: dst_key.to_string(),
            size: source.size,
            etag,
            content_type,
            metadata: user,
            last_modified: Utc::now().timestamp_millis(),
        };
        self.db.upsert_object(&record).await?;
        Ok(record)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo> {
        let data = collect_stream(body).await?;
        if size >= 0 && size != data.len() as i64 {
            warn!(bucket, key, declared = size, actual = data.len(), "declared size mismatch");
        }

        let etag = md5_hex(&data);
        let record = ObjectRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as i64,
            etag,
            content_type: metadata.get(meta::CONTENT_TYPE).cloned(),
            metadata: user_metadata(metadata),
            last_modified: Utc::now().timestamp_millis(),
        };

        self.storage.put_data(bucket, key, data).await?;
        self.db.upsert_object(&record).await?;

        debug!(bucket, key, size = record.size, etag = %record.etag, "object stored");
        Ok(object_info(record))
    }

    async fn get(&self, bucket: &str, key: &str, request: &GetRequestData) -> Result<ByteStream> {
        let record = self.record(bucket, key).await?;
        if request.is_full() {
            return self.storage.get_data(bucket, key, None).await;
        }

        let size = record.size.max(0) as u64;
        let start = request.start_offset.min(size);
        let end = match request.length {
            Some(length) => start.saturating_add(length).min(size),
            None => size,
        };
        if start == end {
            return Ok(common::models::stream_from_bytes(Bytes::new()));
        }
        self.storage
            .get_data(bucket, key, Some(start as usize..end as usize))
            .await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.storage.delete_data(bucket, key).await?;
        self.db.delete_object(bucket, key).await?;
        debug!(bucket, key, "object removed");
        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo> {
        let source = self.record(src_bucket, src_key).await?;
        if self.multipart_copy_threshold > 0 && source.size > self.multipart_copy_threshold {
            return Err(BlobStoreError::EntityTooLarge {
                key: format!("{}/{}", src_bucket, src_key),
                size: source.size,
                limit: self.multipart_copy_threshold,
            });
        }

        let etag = self.content_md5(&source).await?;
        let record = self
            .copy_with_etag(&source, dst_bucket, dst_key, metadata, etag)
            .await?;
        debug!(src_key, dst_key, etag = %record.etag, "object copied");
        Ok(object_info(record))
    }

    async fn copy_multipart(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let source = self.record(src_bucket, src_key).await?;
        // Copied as a single part
        let digest = self.content_md5(&source).await?;
        let etag = composite_etag(std::iter::once(digest.as_str()))?;

        self.copy_with_etag(&source, dst_bucket, dst_key, metadata, etag)
            .await?;
        info!(src_key, dst_key, size = source.size, "object copied by parts");
        Ok(())
    }

    async fn create_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let upload = UploadRecord {
            upload_id: uuid::Uuid::new_v4().to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            metadata: metadata.clone(),
        };
        self.db.insert_upload(&upload).await?;
        debug!(bucket, key, upload_id = %upload.upload_id, "multipart upload created");
        Ok(upload.upload_id)
    }

    async fn put_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
    ) -> Result<MultipartObjectPart> {
        self.upload(bucket, key, upload_id).await?;
        let data = collect_stream(body).await?;
        let part = PartRecord {
            part_number,
            etag: md5_hex(&data),
            size: data.len() as i64,
            last_modified: Utc::now().timestamp_millis(),
        };

        self.storage.put_part(upload_id, part_number, data).await?;
        self.db.upsert_part(upload_id, &part).await?;
        Ok(part_info(part))
    }

    async fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo> {
        let upload = self.upload(bucket, key, upload_id).await?;
        if parts.is_empty() {
            return Err(BlobStoreError::InvalidPart(format!(
                "upload {} completed without parts",
                upload_id
            )));
        }

        let staged: HashMap<u32, PartRecord> = self
            .db
            .list_parts(upload_id, 0, u32::MAX)
            .await?
            .into_iter()
            .map(|p| (p.part_number, p))
            .collect();

        let mut size = 0;
        for part in parts {
            match staged.get(&part.part_number) {
                Some(stored) if stored.etag == part.etag.trim_matches('"') => size += stored.size,
                Some(_) => {
                    return Err(BlobStoreError::InvalidPart(format!(
                        "etag mismatch for part {} of {}",
                        part.part_number, upload_id
                    )))
                }
                None => {
                    return Err(BlobStoreError::InvalidPart(format!(
                        "part {} was never uploaded to {}",
                        part.part_number, upload_id
                    )))
                }
            }
        }

        let numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        self.storage
            .assemble_parts(bucket, key, upload_id, &numbers)
            .await?;

        let record = ObjectRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            etag: composite_etag(parts.iter().map(|p| p.etag.trim_matches('"')))?,
            content_type: upload.metadata.get(meta::CONTENT_TYPE).cloned(),
            metadata: user_metadata(&upload.metadata),
            last_modified: Utc::now().timestamp_millis(),
        };
        self.db.upsert_object(&record).await?;
        self.discard_upload(upload_id, staged.keys().copied()).await?;

        info!(bucket, key, upload_id, parts = parts.len(), size, "multipart upload completed");
        Ok(object_info(record))
    }

    async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult> {
        self.upload(bucket, key, upload_id).await?;
        let max_parts = if max_parts == 0 {
            DEFAULT_MAX_PARTS
        } else {
            max_parts
        };

        // One extra row tells whether the listing is truncated
        let mut page = self
            .db
            .list_parts(upload_id, part_number_marker, max_parts.saturating_add(1))
            .await?;
        let is_truncated = page.len() > max_parts as usize;
        page.truncate(max_parts as usize);

        let parts: Vec<MultipartObjectPart> = page.into_iter().map(part_info).collect();
        Ok(ListObjectPartsResult {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            part_number_marker,
            next_part_number_marker: parts.last().map(|p| p.part_number).unwrap_or(0),
            max_parts,
            is_truncated,
            parts,
        })
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.upload(bucket, key, upload_id).await?;
        let staged = self.db.list_parts(upload_id, 0, u32::MAX).await?;
        self.discard_upload(upload_id, staged.iter().map(|p| p.part_number))
            .await?;
        info!(bucket, key, upload_id, "multipart upload aborted");
        Ok(())
    }

    async fn discard_upload(
        &self,
        upload_id: &str,
        part_numbers: impl Iterator<Item = u32>,
    ) -> Result<()> {
        for part_number in part_numbers {
            self.storage.delete_part(upload_id, part_number).await?;
        }
        self.db.delete_upload(upload_id).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectClient for ObjectStore {
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        _metadata: &HashMap<String, String>,
    ) -> common::Result<ObjectInfo> {
        Ok(object_info(self.record(bucket, key).await?))
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        request: &GetRequestData,
    ) -> common::Result<ByteStream> {
        Ok(self.get(bucket, key, request).await?)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: i64,
        metadata: &HashMap<String, String>,
    ) -> common::Result<ObjectInfo> {
        Ok(self.put(bucket, key, body, size, metadata).await?)
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> common::Result<()> {
        Ok(self.remove(bucket, key).await?)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> common::Result<ObjectInfo> {
        Ok(self
            .copy(src_bucket, src_key, dst_bucket, dst_key, metadata)
            .await?)
    }

    fn copy_object_multipart_threshold(&self) -> i64 {
        self.multipart_copy_threshold
    }

    async fn copy_object_multipart(
        &self,
        _src: &ObjectInfo,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> common::Result<()> {
        Ok(self
            .copy_multipart(src_bucket, src_key, dst_bucket, dst_key, metadata)
            .await?)
    }

    async fn new_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> common::Result<String> {
        Ok(self.create_upload(bucket, key, metadata).await?)
    }

    async fn put_object_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        _size: i64,
    ) -> common::Result<MultipartObjectPart> {
        Ok(self
            .put_part(bucket, key, upload_id, part_number, body)
            .await?)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> common::Result<ObjectInfo> {
        Ok(self.complete(bucket, key, upload_id, parts).await?)
    }

    async fn list_object_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> common::Result<ListObjectPartsResult> {
        Ok(self
            .list_parts(bucket, key, upload_id, part_number_marker, max_parts)
            .await?)
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> common::Result<()> {
        Ok(self.abort(bucket, key, upload_id).await?)
    }
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

fn is_composite(etag: &str) -> bool {
    etag.is_empty() || etag.contains('-')
}

/// md5 over the binary part digests, suffixed with the part count
fn composite_etag<'a>(part_digests: impl Iterator<Item = &'a str>) -> Result<String> {
    let mut hasher = Md5::new();
    let mut count = 0;
    for digest in part_digests {
        let raw = hex::decode(digest)
            .map_err(|_| BlobStoreError::InvalidPart(format!("malformed part etag '{}'", digest)))?;
        hasher.update(raw);
        count += 1;
    }
    Ok(format!("{}-{}", hex::encode(hasher.finalize()), count))
}

/// User metadata kept on a stored object
fn user_metadata(metadata: &HashMap<String, String>) -> HashMap<String, String> {
    metadata
        .iter()
        .filter(|(k, _)| k.starts_with("x-amz-meta-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn object_info(record: ObjectRecord) -> ObjectInfo {
    ObjectInfo {
        key: record.key,
        etag: record.etag,
        size: record.size,
        last_modified: timestamp(record.last_modified),
        content_type: record.content_type,
        metadata: record.metadata,
    }
}

fn part_info(part: PartRecord) -> MultipartObjectPart {
    MultipartObjectPart {
        part_number: part.part_number,
        etag: part.etag,
        size: part.size,
        last_modified: timestamp(part.last_modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::stream_from_bytes;

    const BUCKET: &str = "objects";

    async fn read(store: &ObjectStore, key: &str, request: &GetRequestData) -> Vec<u8> {
        let body = store.get_object(BUCKET, key, request).await.unwrap();
        collect_stream(body).await.unwrap().to_vec()
    }

    async fn put(store: &ObjectStore, key: &str, data: &[u8], metadata: &[(&str, &str)]) -> ObjectInfo {
        let metadata: HashMap<String, String> = metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store
            .put_object(BUCKET, key, stream_from_bytes(data.to_vec()), data.len() as i64, &metadata)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_stat_get() {
        let store = ObjectStore::new_ephemeral().await.unwrap();

        let info = put(
            &store,
            "u-1",
            b"hello world",
            &[
                (meta::CONTENT_TYPE, "text/plain"),
                ("x-amz-meta-owner", "alice"),
                ("x-request-id", "ignored"),
            ],
        )
        .await;
        assert_eq!(info.etag, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(info.size, 11);

        let stat = store.stat_object(BUCKET, "u-1", &HashMap::new()).await.unwrap();
        assert_eq!(stat.etag, info.etag);
        assert_eq!(stat.content_type.as_deref(), Some("text/plain"));
        assert_eq!(stat.metadata.len(), 1);
        assert_eq!(stat.metadata["x-amz-meta-owner"], "alice");

        assert_eq!(read(&store, "u-1", &GetRequestData::default()).await, b"hello world");
        assert_eq!(read(&store, "u-1", &GetRequestData::range(6, 100)).await, b"world");
        assert!(read(&store, "u-1", &GetRequestData::range(11, 5)).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = ObjectStore::new_ephemeral().await.unwrap();

        let err = store
            .stat_object(BUCKET, "nope", &HashMap::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Removing a missing object succeeds, as on S3
        store.remove_object(BUCKET, "nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_keeps_or_replaces_metadata() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        put(&store, "src", b"payload", &[(meta::CONTENT_TYPE, "text/plain"), ("x-amz-meta-a", "1")]).await;

        let kept = store
            .copy_object(BUCKET, "src", BUCKET, "kept", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(kept.content_type.as_deref(), Some("text/plain"));
        assert_eq!(kept.metadata["x-amz-meta-a"], "1");

        let replace = HashMap::from([
            (meta::METADATA_DIRECTIVE.to_string(), meta::DIRECTIVE_REPLACE.to_string()),
            ("x-amz-meta-b".to_string(), "2".to_string()),
        ]);
        let replaced = store
            .copy_object(BUCKET, "src", BUCKET, "replaced", &replace)
            .await
            .unwrap();
        assert_eq!(replaced.metadata.len(), 1);
        assert_eq!(replaced.metadata["x-amz-meta-b"], "2");
        assert_eq!(replaced.etag, md5_hex(b"payload"));
        assert_eq!(read(&store, "replaced", &GetRequestData::default()).await, b"payload");
    }

    #[tokio::test]
    async fn test_copy_above_threshold_is_refused() {
        let store = ObjectStore::new_ephemeral()
            .await
            .unwrap()
            .with_multipart_copy_threshold(4);
        let info = put(&store, "big", b"too large", &[]).await;

        let err = store
            .copy_object(BUCKET, "big", BUCKET, "big", &HashMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("EntityTooLarge"));

        store
            .copy_object_multipart(&info, BUCKET, "big", BUCKET, "big", &HashMap::new())
            .await
            .unwrap();
        let stat = store.stat_object(BUCKET, "big", &HashMap::new()).await.unwrap();
        assert!(stat.etag.ends_with("-1"));
        assert_eq!(read(&store, "big", &GetRequestData::default()).await, b"too large");
    }

    #[tokio::test]
    async fn test_multipart_lifecycle() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        let metadata = HashMap::from([(meta::CONTENT_TYPE.to_string(), "video/mp4".to_string())]);
        let upload_id = store.new_multipart_upload(BUCKET, "movie", &metadata).await.unwrap();

        let mut parts = Vec::new();
        for (n, chunk) in [&b"first-"[..], &b"second"[..]].iter().enumerate() {
            let part = store
                .put_object_part(
                    BUCKET,
                    "movie",
                    &upload_id,
                    n as u32 + 1,
                    stream_from_bytes(chunk.to_vec()),
                    chunk.len() as i64,
                )
                .await
                .unwrap();
            assert_eq!(part.etag, md5_hex(chunk));
            parts.push(part);
        }

        let listed = store
            .list_object_parts(BUCKET, "movie", &upload_id, 0, 1)
            .await
            .unwrap();
        assert_eq!(listed.parts.len(), 1);
        assert!(listed.is_truncated);
        assert_eq!(listed.next_part_number_marker, 1);

        let info = store
            .complete_multipart_upload(BUCKET, "movie", &upload_id, &parts)
            .await
            .unwrap();

        let mut digests = Md5::new();
        digests.update(Md5::digest(b"first-"));
        digests.update(Md5::digest(b"second"));
        assert_eq!(info.etag, format!("{}-2", hex::encode(digests.finalize())));
        assert_eq!(info.size, 12);
        assert_eq!(info.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(read(&store, "movie", &GetRequestData::default()).await, b"first-second");

        // The upload is gone once completed
        let err = store
            .list_object_parts(BUCKET, "movie", &upload_id, 0, 0)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_complete_rejects_unknown_part() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        let upload_id = store
            .new_multipart_upload(BUCKET, "k", &HashMap::new())
            .await
            .unwrap();
        let bogus = MultipartObjectPart {
            part_number: 7,
            etag: md5_hex(b"x"),
            size: 1,
            last_modified: Utc::now(),
        };

        let err = store
            .complete_multipart_upload(BUCKET, "k", &upload_id, &[bogus])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("never uploaded"));
    }

    #[tokio::test]
    async fn test_abort_discards_upload() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        let upload_id = store
            .new_multipart_upload(BUCKET, "k", &HashMap::new())
            .await
            .unwrap();
        store
            .put_object_part(BUCKET, "k", &upload_id, 1, stream_from_bytes(b"x".to_vec()), 1)
            .await
            .unwrap();

        store.abort_multipart_upload(BUCKET, "k", &upload_id).await.unwrap();

        let err = store
            .abort_multipart_upload(BUCKET, "k", &upload_id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new_local(temp_dir.path()).await.unwrap();

        put(&store, "u-1", b"test local storage", &[]).await;

        assert!(temp_dir.path().join("objects.db").exists());
        assert!(temp_dir
            .path()
            .join("objects")
            .join("data")
            .join(BUCKET)
            .join("u-1")
            .exists());
        assert_eq!(
            read(&store, "u-1", &GetRequestData::default()).await,
            b"test local storage"
        );
    }

    #[test]
    fn test_composite_etag_rejects_garbage() {
        assert!(composite_etag(std::iter::once("not-hex")).is_err());
        assert!(is_composite("abc-2"));
        assert!(is_composite(""));
        assert!(!is_composite("5eb63bbbe01eeed093cb22bb8f5acdc3"));
    }
}
