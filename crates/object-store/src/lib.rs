//! SQLite + Object Storage Backend
//!
//! This crate provides an [`ObjectClient`](common::prelude::ObjectClient) with S3
//! semantics that uses SQLite for object metadata and pluggable object storage
//! (S3/MinIO/local filesystem/memory) for object data.
//!
//! # Features
//!
//! - S3 etags: content MD5 for single puts and copies, composite etags for
//!   multipart uploads
//! - Multipart uploads staged as separate objects and assembled on completion
//! - Copy size limit mirroring S3's single-request copy limit
//! - Multiple storage backends: S3, MinIO, local filesystem, in-memory
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! use common::models::stream_from_bytes;
//! use common::prelude::ObjectClient;
//! use flatsync_object_store::ObjectStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ObjectStore::new_local(Path::new("/tmp/objects")).await?;
//! let info = store
//!     .put_object("pydata", "a-uuid", stream_from_bytes("hello"), 5, &HashMap::new())
//!     .await?;
//! assert_eq!(info.etag, "5d41402abc4b2a76b9719d911017c592");
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod object_store;
mod storage;

pub use self::error::{BlobStoreError, Result};
pub use self::object_store::ObjectStore;
pub use self::storage::ObjectStoreConfig;
