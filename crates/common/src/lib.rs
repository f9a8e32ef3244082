/**
 * Per-request routing: which datasource, bucket
 *  and object-store client serve each side of
 *  an operation, and how blobs are laid out there.
 */
pub mod branch;
pub mod context;
pub mod error;
/**
 * The file-operation pipeline: the handler
 *  contract, the terminal executor and the
 *  flat-storage reconciliation stage.
 */
pub mod handler;
pub mod keys;
pub mod meta;
pub mod models;
/**
 * Index entries and their metadata.
 */
pub mod node;
/**
 * Interfaces of the external collaborators:
 *  index, object store and key manager.
 */
pub mod services;
/**
 * In-memory collaborators for tests.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::branch::{BranchInfo, EncryptionMode, Identifier, StorageMode, StorageType};
    pub use crate::context::RequestContext;
    pub use crate::error::{Error, Result};
    pub use crate::handler::{Executor, FlatStorageHandler, Handler, Pipeline};
    pub use crate::keys::LazyKeyManager;
    pub use crate::models::{
        ByteStream, CopyRequestData, GetRequestData, MultipartObjectPart, MultipartRequestData,
        ObjectInfo, PutRequestData,
    };
    pub use crate::node::{Node, NodeType};
    pub use crate::services::{IndexClient, KeyManager, ObjectClient};
    pub use crate::build_info;
}
