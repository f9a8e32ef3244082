//! Well-known metadata keys and values.
//!
//! Request metadata keys are lower-case header names; node metadata keys
//! are short namespaces stored in [`Node::meta`](crate::node::Node).

/// Node metadata: MIME type of a leaf
pub const MIME: &str = "mime";
/// Node metadata: set once the node is known to the index
pub const INDEXED: &str = "indexed";

/// Etag carried by a node reserved ahead of a data transfer
pub const ETAG_TEMPORARY: &str = "temporary";

/// Request metadata: `COPY` keeps the source identity (moves), `REPLACE` rewrites metadata
pub const METADATA_DIRECTIVE: &str = "x-amz-metadata-directive";
pub const DIRECTIVE_COPY: &str = "COPY";
pub const DIRECTIVE_REPLACE: &str = "REPLACE";

/// Request metadata: uuid proposed for the destination of a copy
pub const NODE_UUID: &str = "x-amz-meta-node-uuid";
/// Request metadata: plaintext size of an encrypted object
pub const CLEAR_SIZE: &str = "x-amz-meta-clear-size";
/// Object metadata: hex MD5 of the content, stored when the etag is composite
pub const CONTENT_MD5: &str = "x-amz-meta-content-md5";
/// Request metadata: marks a copy that is one half of a move
pub const MOVE_UUID: &str = "x-move-uuid";
/// Request metadata: MIME type of an upload
pub const CONTENT_TYPE: &str = "content-type";
/// Copy metadata: version of the source object to copy from
pub const COPY_SOURCE_VERSION_ID: &str = "x-amz-copy-source-version-id";

/// Prefix of the owner key under which datasource-level keys are managed
pub const DATASOURCE_OWNER_PREFIX: &str = "ds:";
