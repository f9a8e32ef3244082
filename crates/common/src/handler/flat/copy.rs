use std::collections::HashMap;

use uuid::Uuid;

use super::FlatStorageHandler;
use crate::branch::Identifier;
use crate::context::RequestContext;
use crate::error::Result;
use crate::meta;
use crate::models::CopyRequestData;
use crate::node::{Node, NodeType};

/**
 * Copy protocol
 * =============
 * A copy into a flat storage reserves the destination identity in the index
 *  before any byte moves, so that the blob key (the uuid) is known and the
 *  attempt can be compensated:
 *
 *   Start -> TempCreated -> DataCopied -> Indexed    success
 *   Start -> TempCreated -> Failed -> Reverted       failed data copy
 *   Start -> DataCopied -> Indexed                   version restore
 *
 * Nothing is persisted between phases beyond the temporary node itself.
 *  A failed synchronization after the data copy leaves the temporary node
 *  in the index.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Start,
    TempCreated,
    DataCopied,
    Indexed,
    Failed,
    Reverted,
}

impl CopyState {
    pub fn can_advance(self, next: CopyState) -> bool {
        use CopyState::*;
        matches!(
            (self, next),
            (Start, TempCreated)
                | (Start, DataCopied)
                | (Start, Failed)
                | (TempCreated, DataCopied)
                | (TempCreated, Failed)
                | (DataCopied, Indexed)
                | (Failed, Reverted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CopyState::Indexed | CopyState::Reverted)
    }
}

/// One copy attempt: its current state and the node to revert on failure.
#[derive(Debug)]
struct CopyAttempt {
    path: String,
    state: CopyState,
    revert_target: Option<Node>,
}

impl CopyAttempt {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            state: CopyState::Start,
            revert_target: None,
        }
    }

    fn advance(&mut self, next: CopyState) {
        debug_assert!(
            self.state.can_advance(next),
            "invalid copy transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(path = %self.path, from = ?self.state, to = ?next, "copy state");
        self.state = next;
    }
}

/// Build the node reserved for the destination of a write.
///
/// The uuid is chosen in this order: a move keeps the source uuid; otherwise
///  when the destination has none, or proposes the source's own, a fresh one
///  is generated and then replaced by an explicit uuid from the request
///  metadata if there is one; otherwise the destination's proposal is kept.
pub(super) fn temporary_node(
    from: Option<&Node>,
    to: &Node,
    metadata: &HashMap<String, String>,
    mime: Option<&str>,
) -> Node {
    let mut temporary = to.clone();
    let from_uuid = from.map(|f| f.uuid.as_str()).unwrap_or_default();

    let is_move = metadata
        .get(meta::METADATA_DIRECTIVE)
        .is_some_and(|d| d == meta::DIRECTIVE_COPY);
    if is_move && from.is_some() {
        temporary.uuid = from_uuid.to_string();
    } else if temporary.uuid.is_empty() || temporary.uuid == from_uuid {
        temporary.uuid = Uuid::new_v4().to_string();
        if let Some(explicit) = metadata.get(meta::NODE_UUID).filter(|u| !u.is_empty()) {
            temporary.uuid = explicit.clone();
        }
    }

    temporary.node_type = NodeType::Leaf;
    temporary.etag = meta::ETAG_TEMPORARY.to_string();
    if let Some(mime) = mime.filter(|m| !m.is_empty()) {
        temporary.set_meta(meta::MIME, mime);
    }
    temporary
}

impl FlatStorageHandler {
    pub(super) async fn flat_copy(
        &self,
        ctx: &RequestContext,
        from: &Node,
        to: &mut Node,
        request: &CopyRequestData,
    ) -> Result<i64> {
        let mut attempt = CopyAttempt::new(&to.path);

        if request.is_version_restore() {
            self.resolve_identity(ctx, to).await?;
        } else {
            let temporary = temporary_node(Some(from), to, &request.metadata, from.mime());
            let created = self.index.create_node(&temporary, false).await?;
            to.uuid = created.uuid.clone();
            attempt.revert_target = Some(created);
            attempt.advance(CopyState::TempCreated);
        }

        let copied = match self.next.copy_object(ctx, from, to, request).await {
            Ok(copied) => copied,
            Err(err) => {
                attempt.advance(CopyState::Failed);
                if let Some(temporary) = attempt.revert_target.take() {
                    self.revert(&temporary, &err).await;
                    attempt.advance(CopyState::Reverted);
                }
                return Err(err);
            }
        };
        attempt.advance(CopyState::DataCopied);

        // the destination becomes the `in` side of the synchronization
        let destination = ctx.require_branch(Identifier::To)?.clone();
        let mut dst_ctx = ctx.clone().with_branch(Identifier::In, destination);
        if request.metadata.contains_key(meta::MOVE_UUID) {
            dst_ctx = dst_ctx.with_metadata(&request.metadata);
        }

        self.sync(&dst_ctx, Identifier::To, to, &request.metadata, from.mime())
            .await?;
        attempt.advance(CopyState::Indexed);
        Ok(copied)
    }
}
