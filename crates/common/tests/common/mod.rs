//! Shared setup for pipeline integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::handler::{Executor, FlatStorageHandler, Pipeline};
use common::models::{collect_stream, stream_from_bytes, GetRequestData, PutRequestData};
use common::prelude::*;
use common::testkit::{Event, IndexOp, Journal, MemoryIndex, MemoryObjectClient, StaticKeyManager};

pub const DATASOURCE: &str = "pydata";
pub const BUCKET: &str = "objects";

/// A flat datasource served by in-memory collaborators, behind the
///  executor wrapped by the flat-storage stage.
pub struct Harness {
    pub journal: Journal,
    pub index: Arc<MemoryIndex>,
    pub client: Arc<MemoryObjectClient>,
    pub keys: Arc<StaticKeyManager>,
    pub pipeline: Pipeline,
    branch: BranchInfo,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_branch(|branch| branch)
    }

    /// Adjust the datasource branch, e.g. its encryption or storage type
    pub fn with_branch(configure: impl FnOnce(BranchInfo) -> BranchInfo) -> Self {
        init_tracing();
        let journal = Journal::new();
        let index = Arc::new(MemoryIndex::with_journal(journal.clone()));
        let client = Arc::new(MemoryObjectClient::with_journal(journal.clone()));
        let keys = Arc::new(StaticKeyManager::new());

        let stage_index = index.clone();
        let stage_keys = keys.clone();
        let pipeline = Pipeline::builder(Executor::new(index.clone()))
            .stage(move |next| FlatStorageHandler::new(next, stage_index, stage_keys))
            .build();

        let branch = configure(
            BranchInfo::new(DATASOURCE, BUCKET, client.clone()).with_mode(StorageMode::Flat),
        );

        Self {
            journal,
            index,
            client,
            keys,
            pipeline,
            branch,
        }
    }

    pub fn branch(&self) -> BranchInfo {
        self.branch.clone()
    }

    /// Context of a single-node operation on the datasource
    pub fn ctx(&self) -> RequestContext {
        RequestContext::new().with_branch(Identifier::In, self.branch())
    }

    /// Context of a copy inside the datasource
    pub fn copy_ctx(&self) -> RequestContext {
        self.ctx()
            .with_branch(Identifier::From, self.branch())
            .with_branch(Identifier::To, self.branch())
    }

    /// Upload a file through the pipeline and return its index entry
    pub async fn put(&self, path: &str, data: &[u8]) -> Node {
        self.put_with(path, data, PutRequestData::new(data.len() as i64))
            .await
    }

    pub async fn put_with(&self, path: &str, data: &[u8], request: PutRequestData) -> Node {
        let mut node = Node::leaf(path);
        self.pipeline
            .put_object(
                &self.ctx(),
                &mut node,
                stream_from_bytes(data.to_vec()),
                &request,
            )
            .await
            .unwrap();
        self.index.get(&node.uuid).unwrap()
    }

    pub async fn read(&self, node: &Node) -> Vec<u8> {
        let mut node = node.clone();
        let body = self
            .pipeline
            .get_object(&self.ctx(), &mut node, &GetRequestData::default())
            .await
            .unwrap();
        collect_stream(body).await.unwrap().to_vec()
    }

    /// Index creations of temporary nodes recorded so far, by journal position
    pub fn temporary_creates(&self) -> Vec<usize> {
        self.journal
            .events()
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(e, Event::Index { op: IndexOp::Create, etag, .. } if etag == "temporary")
            })
            .map(|(i, _)| i)
            .collect()
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(data))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
