use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use parking_lot::Mutex;

use super::{Event, Journal};
use crate::error::{Error, Result};
use crate::meta;
use crate::models::{
    collect_stream, stream_from_bytes, ByteStream, GetRequestData, ListObjectPartsResult,
    MultipartObjectPart, ObjectInfo,
};
use crate::services::ObjectClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectOp {
    Stat,
    Get,
    Put,
    Remove,
    Copy,
    CopyMultipart,
    NewMultipart,
    PutPart,
    CompleteMultipart,
    ListParts,
    AbortMultipart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCall {
    pub op: ObjectOp,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn info(&self, key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            etag: self.etag.clone(),
            size: self.data.len() as i64,
            last_modified: self.last_modified,
            content_type: self.content_type.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    metadata: HashMap<String, String>,
    parts: BTreeMap<u32, (Bytes, MultipartObjectPart)>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<(String, String), StoredObject>,
    uploads: HashMap<String, Upload>,
    failures: HashSet<ObjectOp>,
    calls: Vec<ObjectCall>,
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// S3 etag of a multipart object: md5 of the concatenated part digests,
///  suffixed with the part count
fn composite_etag<'a>(parts: impl Iterator<Item = &'a [u8]>) -> String {
    let mut hasher = Md5::new();
    let mut count = 0;
    for part in parts {
        hasher.update(Md5::digest(part));
        count += 1;
    }
    format!("{}-{}", hex::encode(hasher.finalize()), count)
}

/// User metadata kept on a stored object
fn user_metadata(metadata: &HashMap<String, String>) -> HashMap<String, String> {
    metadata
        .iter()
        .filter(|(k, _)| k.starts_with("x-amz-meta-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn not_found(bucket: &str, key: &str) -> Error {
    Error::NotFound(format!("object {}/{}", bucket, key))
}

/// In-memory object store with S3 semantics.
///
/// Copies refuse sources above the multipart-copy threshold, the way S3
///  refuses single copies above 5 GiB.
#[derive(Debug, Clone)]
pub struct MemoryObjectClient {
    inner: Arc<Mutex<Inner>>,
    threshold: Arc<AtomicI64>,
    journal: Journal,
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::with_journal(Journal::new())
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            threshold: Arc::new(AtomicI64::new(0)),
            journal,
        }
    }

    pub fn set_multipart_copy_threshold(&self, threshold: i64) {
        self.threshold.store(threshold, Ordering::SeqCst);
    }

    /// Store an object directly, with a forced etag
    pub fn insert_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>, etag: &str) {
        let object = StoredObject {
            data: data.into(),
            etag: etag.to_string(),
            content_type: None,
            metadata: HashMap::new(),
            last_modified: Utc::now(),
        };
        self.inner
            .lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<ObjectInfo> {
        self.inner
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.info(key))
    }

    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.inner
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Make every later call of `op` fail
    pub fn fail(&self, op: ObjectOp) {
        self.inner.lock().failures.insert(op);
    }

    pub fn recover(&self, op: ObjectOp) {
        self.inner.lock().failures.remove(&op);
    }

    pub fn calls(&self) -> Vec<ObjectCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, op: ObjectOp) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Record a call, failing it if injection is active for `op`
    fn enter(&self, op: ObjectOp, bucket: &str, key: &str) -> Result<()> {
        let call = ObjectCall {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        let failing = {
            let mut inner = self.inner.lock();
            inner.calls.push(call.clone());
            inner.failures.contains(&op)
        };
        self.journal.record(Event::Object(call));
        if failing {
            return Err(Error::object_store(anyhow::anyhow!(
                "injected {:?} failure on {}/{}",
                op,
                bucket,
                key
            )));
        }
        Ok(())
    }

    fn copy_source(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        self.inner
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    /// Destination of a copy: metadata replaced or carried over per directive
    fn copy_target(
        source: &StoredObject,
        metadata: &HashMap<String, String>,
        etag: String,
    ) -> StoredObject {
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
        StoredObject {
            data: source.data.clone(),
            etag,
            content_type,
            metadata: user,
            last_modified: Utc::now(),
        }
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo> {
        self.enter(ObjectOp::Stat, bucket, key)?;
        self.object(bucket, key)
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        request: &GetRequestData,
    ) -> Result<ByteStream> {
        self.enter(ObjectOp::Get, bucket, key)?;
        let data = self
            .object_data(bucket, key)
            .ok_or_else(|| not_found(bucket, key))?;

        let len = data.len() as u64;
        let start = request.start_offset.min(len);
        let end = match request.length {
            Some(length) => start.saturating_add(length).min(len),
            None => len,
        };
        Ok(stream_from_bytes(data.slice(start as usize..end as usize)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        _size: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo> {
        self.enter(ObjectOp::Put, bucket, key)?;
        let data = collect_stream(body).await.map_err(Error::object_store)?;
        let object = StoredObject {
            etag: md5_hex(&data),
            data,
            content_type: metadata.get(meta::CONTENT_TYPE).cloned(),
            metadata: user_metadata(metadata),
            last_modified: Utc::now(),
        };
        let info = object.info(key);
        self.inner
            .lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
        Ok(info)
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.enter(ObjectOp::Remove, bucket, key)?;
        self.inner
            .lock()
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ObjectInfo> {
        self.enter(ObjectOp::Copy, dst_bucket, dst_key)?;
        let source = self.copy_source(src_bucket, src_key)?;

        let threshold = self.copy_object_multipart_threshold();
        if threshold > 0 && source.data.len() as i64 > threshold {
            return Err(Error::object_store(anyhow::anyhow!(
                "EntityTooLarge: {}/{} exceeds the single copy limit of {} bytes",
                src_bucket,
                src_key,
                threshold
            )));
        }

        let target = Self::copy_target(&source, metadata, md5_hex(&source.data));
        let info = target.info(dst_key);
        self.inner
            .lock()
            .objects
            .insert((dst_bucket.to_string(), dst_key.to_string()), target);
        Ok(info)
    }

    fn copy_object_multipart_threshold(&self) -> i64 {
        self.threshold.load(Ordering::SeqCst)
    }

    async fn copy_object_multipart(
        &self,
        _src: &ObjectInfo,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.enter(ObjectOp::CopyMultipart, dst_bucket, dst_key)?;
        let source = self.copy_source(src_bucket, src_key)?;

        let etag = composite_etag(std::iter::once(source.data.as_ref()));
        let target = Self::copy_target(&source, metadata, etag);
        self.inner
            .lock()
            .objects
            .insert((dst_bucket.to_string(), dst_key.to_string()), target);
        Ok(())
    }

    async fn new_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        self.enter(ObjectOp::NewMultipart, bucket, key)?;
        let upload_id = uuid::Uuid::new_v4().to_string();
        self.inner.lock().uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                metadata: metadata.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn put_object_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        _size: i64,
    ) -> Result<MultipartObjectPart> {
        self.enter(ObjectOp::PutPart, bucket, key)?;
        let data = collect_stream(body).await.map_err(Error::object_store)?;
        let part = MultipartObjectPart {
            part_number,
            etag: md5_hex(&data),
            size: data.len() as i64,
            last_modified: Utc::now(),
        };

        let mut inner = self.inner.lock();
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload_id)))?;
        upload.parts.insert(part_number, (data, part.clone()));
        Ok(part)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo> {
        self.enter(ObjectOp::CompleteMultipart, bucket, key)?;
        let mut inner = self.inner.lock();
        let upload = inner
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload_id)))?;

        let mut chunks = Vec::with_capacity(parts.len());
        for part in parts {
            let (data, _) = upload.parts.get(&part.part_number).ok_or_else(|| {
                Error::InvalidRequest(format!(
                    "part {} was never uploaded to {}",
                    part.part_number, upload_id
                ))
            })?;
            chunks.push(data.clone());
        }

        let object = StoredObject {
            etag: composite_etag(chunks.iter().map(|c| c.as_ref())),
            data: chunks.concat().into(),
            content_type: upload.metadata.get(meta::CONTENT_TYPE).cloned(),
            metadata: user_metadata(&upload.metadata),
            last_modified: Utc::now(),
        };
        let info = object.info(&upload.key);
        inner.objects.insert((upload.bucket, upload.key), object);
        Ok(info)
    }

    async fn list_object_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult> {
        self.enter(ObjectOp::ListParts, bucket, key)?;
        let inner = self.inner.lock();
        let upload = inner
            .uploads
            .get(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload_id)))?;

        let max_parts = if max_parts == 0 { 1000 } else { max_parts };
        let mut remaining = upload
            .parts
            .range(part_number_marker.saturating_add(1)..)
            .map(|(_, (_, part))| part.clone());
        let parts: Vec<_> = remaining.by_ref().take(max_parts as usize).collect();
        let is_truncated = remaining.next().is_some();

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

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.enter(ObjectOp::AbortMultipart, bucket, key)?;
        self.inner
            .lock()
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("upload {}", upload_id)))
    }
}
