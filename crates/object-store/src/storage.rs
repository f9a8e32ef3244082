//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, ObjectStore, WriteMultipart};
use serde::{Deserialize, Serialize};

use common::models::ByteStream;

use crate::error::{BlobStoreError, Result};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Wrapper around different object storage backends.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                let prefix = ObjectPath::from("");
                let mut stream = store.list(Some(&prefix));
                match stream.try_next().await {
                    Ok(_) => {}
                    Err(object_store::Error::NotFound { .. }) => {
                        return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                    }
                    Err(e) => {
                        let msg = e.to_string();
                        if msg.contains("NoSuchBucket")
                            || msg.contains("bucket") && msg.contains("not")
                        {
                            return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                        }
                        return Err(e.into());
                    }
                }
                drop(stream);

                store
            }
        };

        Ok(Self { inner })
    }

    /// Build the object path for object data.
    fn data_path(bucket: &str, key: &str) -> ObjectPath {
        ObjectPath::from(format!("data/{}/{}", bucket, key))
    }

    /// Build the object path for a staged multipart part.
    fn part_path(upload_id: &str, part_number: u32) -> ObjectPath {
        ObjectPath::from(format!("uploads/{}/{}", upload_id, part_number))
    }

    /// Put object data into storage.
    pub async fn put_data(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let path = Self::data_path(bucket, key);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Stream object data, optionally restricted to a byte range.
    pub async fn get_data(
        &self,
        bucket: &str,
        key: &str,
        range: Option<Range<usize>>,
    ) -> Result<ByteStream> {
        let path = Self::data_path(bucket, key);
        let options = GetOptions {
            range: range.map(GetRange::Bounded),
            ..Default::default()
        };
        let result = match self.inner.get_opts(&path, options).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(BlobStoreError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(result.into_stream().map_err(std::io::Error::other).boxed())
    }

    /// Delete object data from storage.
    pub async fn delete_data(&self, bucket: &str, key: &str) -> Result<()> {
        let path = Self::data_path(bucket, key);
        // Ignore NotFound errors - the data may already be deleted
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy object data between keys. Copying a key onto itself is a no-op.
    pub async fn copy_data(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let from = Self::data_path(src_bucket, src_key);
        let to = Self::data_path(dst_bucket, dst_key);
        if from == to {
            return Ok(());
        }
        match self.inner.copy(&from, &to).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(BlobStoreError::NotFound(from.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage a multipart part.
    pub async fn put_part(&self, upload_id: &str, part_number: u32, data: Bytes) -> Result<()> {
        let path = Self::part_path(upload_id, part_number);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Delete a staged part, ignoring parts already gone.
    pub async fn delete_part(&self, upload_id: &str, part_number: u32) -> Result<()> {
        let path = Self::part_path(upload_id, part_number);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the staged parts, in the given order, as the data of `bucket/key`.
    pub async fn assemble_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<()> {
        let path = Self::data_path(bucket, key);
        let upload = self.inner.put_multipart(&path).await?;
        let mut writer = WriteMultipart::new(upload);

        for part_number in part_numbers {
            let part = Self::part_path(upload_id, *part_number);
            let data = match self.inner.get(&part).await {
                Ok(result) => result.bytes().await,
                Err(e) => Err(e),
            };
            match data {
                Ok(bytes) => writer.write(&bytes),
                Err(e) => {
                    writer.abort().await?;
                    return Err(e.into());
                }
            }
        }

        writer.finish().await?;
        Ok(())
    }
}

#[cfg(test)]
impl Storage {
    /// Create an in-memory storage backend (test-only).
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    /// Check if object data exists in storage.
    pub async fn has_data(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = Self::data_path(bucket, key);
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a whole object (test-only).
    pub async fn read_all(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let body = self.get_data(bucket, key, None).await?;
        Ok(common::models::collect_stream(body).await?)
    }
}
