use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use common::branch::StorageMode;
use common::prelude::{
    BranchInfo, Error, Executor, FlatStorageHandler, Identifier, IndexClient, KeyManager,
    LazyKeyManager, ObjectClient, Pipeline, RequestContext,
};
use object_store::{ObjectStore, ObjectStoreConfig};

use crate::op::OpContext;
use crate::state::{AppState, DatasourceConfig};

/// Composed pipeline plus the routing of every configured datasource.
#[derive(Debug)]
pub struct Runtime {
    pipeline: Pipeline,
    branches: HashMap<String, BranchInfo>,
}

/// A `<datasource>/<path>` argument, split and normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub datasource: String,
    /// Full node path, datasource segment included
    pub path: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, RuntimeError> {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let Some(datasource) = segments.first() else {
            return Err(RuntimeError::InvalidPath(raw.to_string()));
        };
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(RuntimeError::InvalidPath(raw.to_string()));
        }

        Ok(Self {
            datasource: datasource.to_string(),
            path: segments.join("/"),
        })
    }

    /// Whether the target addresses the datasource root rather than a node below it
    pub fn is_root(&self) -> bool {
        self.path == self.datasource
    }
}

impl Runtime {
    /// Load the state directory and open everything it configures
    pub async fn load(ctx: &OpContext) -> Result<Self, RuntimeError> {
        let state = AppState::load(ctx.config_path.clone())?;
        Self::open(&state).await
    }

    /// Open the index and one object store per configured datasource.
    pub async fn open(state: &AppState) -> Result<Self, RuntimeError> {
        let index_url = index_url(state)?;
        let index = index::Database::connect(&index_url).await?;

        let mut branches = HashMap::new();
        for ds in &state.config.datasources {
            let store = open_store(state, ds).await?;
            tracing::debug!(datasource = %ds.name, bucket = %ds.bucket, flat = ds.flat, "opened datasource");
            branches.insert(ds.name.clone(), branch_info(ds, Arc::new(store)));
        }

        // plain sizes are only looked up for encrypted copies
        let keys = Arc::new(LazyKeyManager::new(move || {
            let url = index_url.clone();
            async move {
                let db = index::Database::connect(&url)
                    .await
                    .map_err(Error::key_manager)?;
                Ok(Arc::new(db) as Arc<dyn KeyManager>)
            }
        }));

        let index_client: Arc<dyn IndexClient> = Arc::new(index);
        let flat_index = index_client.clone();
        let pipeline = Pipeline::builder(Executor::new(index_client))
            .stage(move |next| FlatStorageHandler::new(next, flat_index, keys))
            .build();

        Ok(Self {
            pipeline,
            branches,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn branch(&self, target: &Target) -> Result<&BranchInfo, RuntimeError> {
        self.branches
            .get(&target.datasource)
            .ok_or_else(|| RuntimeError::UnknownDatasource(target.datasource.clone()))
    }

    /// Context for a single-node operation
    pub fn context(&self, target: &Target) -> Result<RequestContext, RuntimeError> {
        let branch = self.branch(target)?.clone();
        Ok(RequestContext::new().with_branch(Identifier::In, branch))
    }

    /// Context for a copy between two targets, possibly on different datasources
    pub fn copy_context(&self, from: &Target, to: &Target) -> Result<RequestContext, RuntimeError> {
        let from_branch = self.branch(from)?.clone();
        let to_branch = self.branch(to)?.clone();
        Ok(RequestContext::new()
            .with_branch(Identifier::From, from_branch)
            .with_branch(Identifier::To, to_branch))
    }
}

fn index_url(state: &AppState) -> Result<Url, RuntimeError> {
    let raw = format!("sqlite://{}", state.index_path.display());
    Url::parse(&raw).map_err(|e| RuntimeError::IndexUrl(raw, e))
}

async fn open_store(state: &AppState, ds: &DatasourceConfig) -> Result<ObjectStore, RuntimeError> {
    let db_path = state.objects_path.join(format!("{}.db", ds.name));
    let config = ds.storage.clone().unwrap_or_else(|| ObjectStoreConfig::Local {
        path: state.objects_path.join(&ds.name),
    });

    let store = ObjectStore::new(&db_path, config)
        .await
        .map_err(|e| RuntimeError::ObjectStore(ds.name.clone(), e))?;
    Ok(store.with_multipart_copy_threshold(ds.multipart_copy_threshold))
}

fn branch_info(ds: &DatasourceConfig, client: Arc<dyn ObjectClient>) -> BranchInfo {
    let mode = if ds.flat {
        StorageMode::Flat
    } else {
        StorageMode::Hierarchical
    };
    BranchInfo::new(ds.name.clone(), ds.bucket.clone(), client)
        .with_mode(mode)
        .with_encryption(ds.encryption)
        .with_storage_type(ds.storage_type)
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("state error: {0}")]
    State(#[from] crate::state::StateError),

    #[error("invalid index location '{0}': {1}")]
    IndexUrl(String, url::ParseError),

    #[error("index setup failed: {0}")]
    Index(#[from] index::DatabaseSetupError),

    #[error("failed to open object store for datasource '{0}': {1}")]
    ObjectStore(String, object_store::BlobStoreError),

    #[error("unknown datasource '{0}'")]
    UnknownDatasource(String),

    #[error("invalid path '{0}', expected <datasource>/<path>")]
    InvalidPath(String),
}
