use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::services::ObjectClient;

/// Side of a request. Single-node operations only use `In`;
///  copies read from `From` and write to `To`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identifier {
    In,
    From,
    To,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::In => write!(f, "in"),
            Identifier::From => write!(f, "from"),
            Identifier::To => write!(f, "to"),
        }
    }
}

/// How a datasource lays its blobs out in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Blobs are keyed by node uuid; the hierarchy only lives in the index
    Flat,
    /// Blobs are keyed by their path inside the datasource
    #[default]
    Hierarchical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    #[default]
    Clear,
    Master,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Local,
    S3,
    Gcs,
    Azure,
}

/// Routing for one side of a request: which datasource, bucket and
///  client serve it, and how its blobs are stored.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    /// Datasource name, also the first segment of node paths
    pub name: String,
    pub bucket: String,
    pub mode: StorageMode,
    pub encryption: EncryptionMode,
    pub storage_type: StorageType,
    pub client: Arc<dyn ObjectClient>,
}

impl BranchInfo {
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        client: Arc<dyn ObjectClient>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            mode: StorageMode::default(),
            encryption: EncryptionMode::default(),
            storage_type: StorageType::default(),
            client,
        }
    }

    pub fn with_mode(mut self, mode: StorageMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_encryption(mut self, encryption: EncryptionMode) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    pub fn is_flat(&self) -> bool {
        self.mode == StorageMode::Flat
    }

    /// Object-store key of a node on this branch.
    ///
    /// Flat branches key blobs by uuid, so the node must already carry one.
    ///  Hierarchical branches key blobs by the path below the datasource.
    pub fn object_key(&self, node: &Node) -> Result<String> {
        match self.mode {
            StorageMode::Flat => {
                if node.uuid.is_empty() {
                    return Err(Error::MissingIdentity(node.path.clone()));
                }
                Ok(node.uuid.clone())
            }
            StorageMode::Hierarchical => {
                let path = node.path.trim_start_matches('/');
                let key = match path.strip_prefix(self.name.as_str()) {
                    Some("") => "",
                    Some(rest) => rest.strip_prefix('/').unwrap_or(path),
                    None => path,
                };
                if key.is_empty() {
                    return Err(Error::InvalidRequest(format!(
                        "path '{}' does not address an object",
                        node.path
                    )));
                }
                Ok(key.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MemoryObjectClient;

    fn branch(mode: StorageMode) -> BranchInfo {
        BranchInfo::new("pydata", "bucket", Arc::new(MemoryObjectClient::new())).with_mode(mode)
    }

    #[test]
    fn test_flat_key_is_uuid() {
        let branch = branch(StorageMode::Flat);
        let node = Node::leaf("pydata/a/b.txt").with_uuid("1234");
        assert_eq!(branch.object_key(&node).unwrap(), "1234");
    }

    #[test]
    fn test_flat_key_requires_uuid() {
        let branch = branch(StorageMode::Flat);
        let node = Node::leaf("pydata/a/b.txt");
        assert!(matches!(
            branch.object_key(&node),
            Err(Error::MissingIdentity(path)) if path == "pydata/a/b.txt"
        ));
    }

    #[test]
    fn test_hierarchical_key_strips_datasource() {
        let branch = branch(StorageMode::Hierarchical);
        assert_eq!(
            branch.object_key(&Node::leaf("/pydata/a/b.txt")).unwrap(),
            "a/b.txt"
        );
        // a path outside of the datasource is used as-is
        assert_eq!(
            branch.object_key(&Node::leaf("other/b.txt")).unwrap(),
            "other/b.txt"
        );
        assert!(branch.object_key(&Node::leaf("pydata")).is_err());
    }

    #[test]
    fn test_identifier_display() {
        assert_eq!(Identifier::In.to_string(), "in");
        assert_eq!(Identifier::From.to_string(), "from");
        assert_eq!(Identifier::To.to_string(), "to");
    }
}
