use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::meta;

/// Type of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Type not known yet, e.g. a node addressed by path only
    #[default]
    Unknown,
    /// A file, backed by a blob in the object store
    Leaf,
    /// A folder, which only exists in the index
    Collection,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Unknown => "unknown",
            NodeType::Leaf => "leaf",
            NodeType::Collection => "collection",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "leaf" => NodeType::Leaf,
            "collection" => NodeType::Collection,
            _ => NodeType::Unknown,
        }
    }
}

/**
 * Nodes
 * =====
 * A node is an entry of the metadata index. Its uuid is its identity and
 *  never changes once assigned; its path is where the hierarchy shows it
 *  and may change on moves.
 * On flat storages the uuid is also the object-store key of a leaf, so
 *  a leaf must carry its uuid before anything addresses its blob.
 */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub uuid: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub size: i64,
    /// Modification time, unix seconds
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl Node {
    /// Node addressed by path only
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn leaf(path: impl Into<String>) -> Self {
        Self {
            node_type: NodeType::Leaf,
            ..Self::new(path)
        }
    }

    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            node_type: NodeType::Collection,
            ..Self::new(path)
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::Leaf
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.meta.insert(key.to_string(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn string_meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    /// MIME type, if one was recorded
    pub fn mime(&self) -> Option<&str> {
        self.string_meta(meta::MIME).filter(|m| !m.is_empty())
    }

    pub fn is_indexed(&self) -> bool {
        self.meta(meta::INDEXED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// True while the node is a reservation made ahead of a data transfer
    pub fn is_temporary(&self) -> bool {
        self.etag == meta::ETAG_TEMPORARY
    }
}
