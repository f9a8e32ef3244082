//! File-operation pipeline.
//!
//! A [`Pipeline`] is an ordered chain of [`Handler`] stages composed once at
//!  startup. Each stage owns a reference to the next one and decides whether
//!  to forward, intercept or augment a call; the [`Executor`] at the end of
//!  the chain talks to the object store.

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::models::{
    ByteStream, CopyRequestData, GetRequestData, ListObjectPartsResult, MultipartObjectPart,
    MultipartRequestData, ObjectInfo, PutRequestData,
};
use crate::node::Node;

mod executor;
pub mod flat;

pub use executor::Executor;
pub use flat::{CopyState, FlatStorageHandler};

/// One stage of the file-operation pipeline.
///
/// Operations that address a blob take the node mutably: a stage may attach
///  the identity it resolved so that later stages and the caller see it.
#[async_trait]
pub trait Handler: Send + Sync + Debug {
    async fn read_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        with_object_stats: bool,
    ) -> Result<Node>;

    async fn create_node(
        &self,
        ctx: &RequestContext,
        node: &Node,
        update_if_exists: bool,
    ) -> Result<Node>;

    async fn delete_node(&self, ctx: &RequestContext, node: &Node) -> Result<bool>;

    async fn get_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        request: &GetRequestData,
    ) -> Result<ByteStream>;

    /// Returns the number of bytes stored
    async fn put_object(
        &self,
        ctx: &RequestContext,
        node: &mut Node,
        body: ByteStream,
        request: &PutRequestData,
    ) -> Result<i64>;

    /// Returns the number of bytes copied
    async fn copy_object(
        &self,
        ctx: &RequestContext,
        from: &Node,
        to: &mut Node,
        request: &CopyRequestData,
    ) -> Result<i64>;

    /// Returns the upload id
    async fn multipart_create(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        request: &MultipartRequestData,
    ) -> Result<String>;

    async fn multipart_put_object_part(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        request: &PutRequestData,
    ) -> Result<MultipartObjectPart>;

    async fn multipart_complete(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        parts: &[MultipartObjectPart],
    ) -> Result<ObjectInfo>;

    async fn multipart_list_object_parts(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: u32,
    ) -> Result<ListObjectPartsResult>;

    async fn multipart_abort(
        &self,
        ctx: &RequestContext,
        target: &mut Node,
        upload_id: &str,
        request: &MultipartRequestData,
    ) -> Result<()>;
}

type Stage = Box<dyn FnOnce(Arc<dyn Handler>) -> Arc<dyn Handler> + Send>;

/// Entry point of a composed handler chain.
#[derive(Debug, Clone)]
pub struct Pipeline {
    head: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn builder(terminal: impl Handler + 'static) -> PipelineBuilder {
        PipelineBuilder {
            terminal: Arc::new(terminal),
            stages: Vec::new(),
        }
    }

    /// Shared handle to the first stage
    pub fn handler(&self) -> Arc<dyn Handler> {
        self.head.clone()
    }
}

impl Deref for Pipeline {
    type Target = dyn Handler;

    fn deref(&self) -> &Self::Target {
        self.head.as_ref()
    }
}

pub struct PipelineBuilder {
    terminal: Arc<dyn Handler>,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    /// Append a stage. Stages see requests in the order they are added,
    ///  the terminal handler last.
    pub fn stage<F, H>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn Handler>) -> H + Send + 'static,
        H: Handler + 'static,
    {
        self.stages
            .push(Box::new(move |next| Arc::new(wrap(next)) as Arc<dyn Handler>));
        self
    }

    pub fn build(self) -> Pipeline {
        let head = self
            .stages
            .into_iter()
            .rev()
            .fold(self.terminal, |next, wrap| wrap(next));
        Pipeline { head }
    }
}
