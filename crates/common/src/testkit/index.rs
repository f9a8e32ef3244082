use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{Event, Journal};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::services::IndexClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOp {
    Create,
    Read,
    Delete,
}

#[derive(Debug, Default)]
struct Inner {
    /// uuid -> node
    nodes: HashMap<String, Node>,
    failures: HashSet<IndexOp>,
    counts: HashMap<IndexOp, usize>,
}

impl Inner {
    fn by_path(&self, path: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.path == path)
    }

    fn lookup(&self, node: &Node) -> Option<&Node> {
        if node.uuid.is_empty() {
            self.by_path(&node.path)
        } else {
            self.nodes.get(&node.uuid)
        }
    }
}

/// In-memory node index, with the upsert rules of the SQLite index.
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    inner: Arc<Mutex<Inner>>,
    journal: Journal,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::with_journal(Journal::new())
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            journal,
        }
    }

    /// Seed a node without going through the client interface
    pub fn insert(&self, mut node: Node) -> Node {
        if node.uuid.is_empty() {
            node.uuid = Uuid::new_v4().to_string();
        }
        self.inner
            .lock()
            .nodes
            .insert(node.uuid.clone(), node.clone());
        node
    }

    pub fn get(&self, uuid: &str) -> Option<Node> {
        self.inner.lock().nodes.get(uuid).cloned()
    }

    pub fn get_by_path(&self, path: &str) -> Option<Node> {
        self.inner.lock().by_path(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail(&self, op: IndexOp) {
        self.inner.lock().failures.insert(op);
    }

    pub fn recover(&self, op: IndexOp) {
        self.inner.lock().failures.remove(&op);
    }

    pub fn count(&self, op: IndexOp) -> usize {
        self.inner.lock().counts.get(&op).copied().unwrap_or(0)
    }

    pub fn read_count(&self) -> usize {
        self.count(IndexOp::Read)
    }

    fn enter(&self, op: IndexOp, node: &Node) -> Result<()> {
        let failing = {
            let mut inner = self.inner.lock();
            *inner.counts.entry(op).or_default() += 1;
            inner.failures.contains(&op)
        };
        self.journal.record(Event::Index {
            op,
            path: node.path.clone(),
            uuid: node.uuid.clone(),
            etag: node.etag.clone(),
        });
        if failing {
            return Err(Error::index(anyhow::anyhow!(
                "injected {:?} failure on '{}'",
                op,
                node.path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexClient for MemoryIndex {
    async fn create_node(&self, node: &Node, update_if_exists: bool) -> Result<Node> {
        self.enter(IndexOp::Create, node)?;
        let mut inner = self.inner.lock();

        let by_uuid = (!node.uuid.is_empty())
            .then(|| inner.nodes.get(&node.uuid).cloned())
            .flatten();
        let by_path = inner.by_path(&node.path).cloned();

        let uuid = match (by_uuid, by_path) {
            (Some(_), Some(at_path)) if at_path.uuid != node.uuid => {
                return Err(Error::Conflict(format!(
                    "path '{}' is taken by another node",
                    node.path
                )));
            }
            (Some(existing), _) | (None, Some(existing)) => {
                if !update_if_exists {
                    return Err(Error::Conflict(format!(
                        "node already exists at '{}'",
                        existing.path
                    )));
                }
                if !node.uuid.is_empty() && existing.uuid != node.uuid {
                    return Err(Error::Conflict(format!(
                        "path '{}' is taken by another node",
                        node.path
                    )));
                }
                existing.uuid
            }
            (None, None) if node.uuid.is_empty() => Uuid::new_v4().to_string(),
            (None, None) => node.uuid.clone(),
        };

        let mut stored = node.clone();
        stored.uuid = uuid;
        inner.nodes.insert(stored.uuid.clone(), stored.clone());
        Ok(stored)
    }

    async fn read_node(&self, node: &Node) -> Result<Node> {
        self.enter(IndexOp::Read, node)?;
        self.inner
            .lock()
            .lookup(node)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("node at '{}'", node.path)))
    }

    async fn delete_node(&self, node: &Node) -> Result<bool> {
        self.enter(IndexOp::Delete, node)?;
        let mut inner = self.inner.lock();
        let uuid = match inner.lookup(node) {
            Some(existing) => existing.uuid.clone(),
            None => return Ok(false),
        };
        Ok(inner.nodes.remove(&uuid).is_some())
    }
}
