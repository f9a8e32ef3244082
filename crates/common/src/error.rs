//! Error types shared by every pipeline stage and collaborator.

use std::fmt;

use crate::branch::Identifier;

/// Remote collaborator a failed call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Index,
    ObjectStore,
    KeyManager,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Index => write!(f, "index service"),
            Service::ObjectStore => write!(f, "object store"),
            Service::KeyManager => write!(f, "key manager"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation would overwrite a node of a different type,
    ///  e.g. a folder on top of an existing file
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing index entry or missing object
    #[error("not found: {0}")]
    NotFound(String),

    /// A call to the index, the object store or the key manager failed
    #[error("{service} call failed: {source}")]
    Upstream {
        service: Service,
        #[source]
        source: anyhow::Error,
    },

    /// The request context carries no routing for this side
    #[error("no branch info for identifier '{0}'")]
    MissingBranch(Identifier),

    /// A flat-storage node has no uuid and none could be resolved
    #[error("missing uuid for node at '{0}'")]
    MissingIdentity(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn upstream(service: Service, source: impl Into<anyhow::Error>) -> Self {
        Error::Upstream {
            service,
            source: source.into(),
        }
    }

    pub fn index(source: impl Into<anyhow::Error>) -> Self {
        Self::upstream(Service::Index, source)
    }

    pub fn object_store(source: impl Into<anyhow::Error>) -> Self {
        Self::upstream(Service::ObjectStore, source)
    }

    pub fn key_manager(source: impl Into<anyhow::Error>) -> Self {
        Self::upstream(Service::KeyManager, source)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_names_service() {
        let err = Error::object_store(std::io::Error::other("connection reset"));
        assert_eq!(
            err.to_string(),
            "object store call failed: connection reset"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_missing_branch_display() {
        let err = Error::MissingBranch(Identifier::To);
        assert_eq!(err.to_string(), "no branch info for identifier 'to'");
    }
}
