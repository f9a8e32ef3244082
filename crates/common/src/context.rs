use std::collections::HashMap;

use crate::branch::{BranchInfo, Identifier};
use crate::error::{Error, Result};

/// Request-scoped state handed to every pipeline stage.
///
/// Branch routing is resolved once when the request enters the pipeline;
///  stages derive new contexts instead of mutating a shared one.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    branches: HashMap<Identifier, BranchInfo>,
    // ambient metadata forwarded to the object store
    metadata: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, identifier: Identifier, info: BranchInfo) -> Self {
        self.branches.insert(identifier, info);
        self
    }

    /// Merge extra metadata over the ambient metadata
    pub fn with_metadata(mut self, extra: &HashMap<String, String>) -> Self {
        self.metadata
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn branch(&self, identifier: Identifier) -> Option<&BranchInfo> {
        self.branches.get(&identifier)
    }

    pub fn require_branch(&self, identifier: Identifier) -> Result<&BranchInfo> {
        self.branch(identifier)
            .ok_or(Error::MissingBranch(identifier))
    }

    /// Whether the given side of the request is routed to a flat storage
    pub fn is_flat(&self, identifier: Identifier) -> bool {
        self.branch(identifier).is_some_and(BranchInfo::is_flat)
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
