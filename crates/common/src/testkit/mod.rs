/// In-memory collaborators for pipeline tests
///
/// This module provides doubles for the index, the object store and the key
/// manager, with call recording and failure injection, so that the pipeline
/// can be exercised without any external service.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{Journal, MemoryIndex, MemoryObjectClient, ObjectOp};
///
/// #[tokio::test]
/// async fn test_failed_delete_keeps_index() {
///     let journal = Journal::new();
///     let index = MemoryIndex::with_journal(journal.clone());
///     let client = MemoryObjectClient::with_journal(journal.clone());
///
///     // every remove call now fails
///     client.fail(ObjectOp::Remove);
///
///     // ... run the pipeline, then inspect `journal.events()`
/// }
/// ```
mod index;
mod keys;
mod object_client;

use std::sync::Arc;

use parking_lot::Mutex;

pub use index::{IndexOp, MemoryIndex};
pub use keys::StaticKeyManager;
pub use object_client::{MemoryObjectClient, ObjectCall, ObjectOp};

/// A call observed by one of the in-memory collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Index {
        op: IndexOp,
        path: String,
        uuid: String,
        etag: String,
    },
    Object(ObjectCall),
}

/// Ordered record of calls, shared between collaborators so that tests can
///  assert on the interleaving of index and object-store operations.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Position of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.lock().iter().position(predicate)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
