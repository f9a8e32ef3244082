//! Error types for the object store.

/// Errors that can occur when working with the object store.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored metadata could not be (de)serialized
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// Multipart upload not found
    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    /// A completed part list references a missing or mismatching part
    #[error("invalid part: {0}")]
    InvalidPart(String),

    /// Source of a single-request copy exceeds the copy limit
    #[error("copy source {key} is {size} bytes, above the {limit} bytes copy limit (EntityTooLarge)")]
    EntityTooLarge { key: String, size: i64, limit: i64 },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before using the store.")]
    BucketNotFound(String),
}

/// Result type alias for object store operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;

impl From<BlobStoreError> for common::Error {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound(what) | BlobStoreError::NoSuchUpload(what) => {
                common::Error::NotFound(what)
            }
            other => common::Error::object_store(other),
        }
    }
}
