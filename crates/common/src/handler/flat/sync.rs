use std::collections::HashMap;

use super::etag::recompute_etag;
use crate::branch::Identifier;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::meta;
use crate::node::{Node, NodeType};
use crate::services::IndexClient;

/// A store-reported etag that is not a content hash of the object
fn is_composite(etag: &str) -> bool {
    etag.is_empty() || etag.contains('-')
}

fn clear_size(metadata: &HashMap<String, String>) -> Option<i64> {
    metadata
        .get(meta::CLEAR_SIZE)
        .and_then(|size| size.trim().parse::<i64>().ok())
}

/// Reconcile the index entry of a node after a successful write.
///
/// Re-reads the authoritative object statistics and upserts the index entry
///  with them. A composite etag is replaced by a recomputed one when
///  possible; an index write failure is returned.
pub(super) async fn post_write_sync(
    next: &dyn Handler,
    index: &dyn IndexClient,
    ctx: &RequestContext,
    identifier: Identifier,
    node: &Node,
    metadata: &HashMap<String, String>,
    mime: Option<&str>,
) -> Result<Node> {
    let mut update = match next.read_node(ctx, node, false).await {
        Ok(indexed) => indexed,
        Err(_) if !node.uuid.is_empty() => node.clone(),
        Err(_) => return Err(Error::MissingIdentity(node.path.clone())),
    };

    let mut stat_target = node.clone();
    if stat_target.uuid.is_empty() {
        stat_target.uuid = update.uuid.clone();
    }
    let stats = next.read_node(ctx, &stat_target, true).await?;

    update.mtime = stats.mtime;
    update.size = clear_size(metadata).unwrap_or(stats.size);
    update.etag = stats.etag;
    if update.node_type == NodeType::Unknown {
        update.node_type = NodeType::Leaf;
    }

    if is_composite(&update.etag) {
        match recompute_etag(ctx, identifier, &update).await {
            Ok(recomputed) => {
                tracing::info!(
                    path = %update.path,
                    reported = %update.etag,
                    recomputed = %recomputed,
                    "recomputed etag"
                );
                update.etag = recomputed;
            }
            Err(err) => {
                // degraded: the index keeps the store-reported etag
                tracing::error!(
                    path = %update.path,
                    etag = %update.etag,
                    error = %err,
                    "cannot recompute etag"
                );
            }
        }
    }

    if let Some(mime) = mime.filter(|m| !m.is_empty()) {
        update.set_meta(meta::MIME, mime);
    }

    let stored = index.create_node(&update, true).await?;
    tracing::debug!(
        path = %stored.path,
        uuid = %stored.uuid,
        size = stored.size,
        etag = %stored.etag,
        "synchronized index node"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_etags() {
        assert!(is_composite(""));
        assert!(is_composite("9b2cf535f27731c974343645a3985328-3"));
        assert!(!is_composite("5d41402abc4b2a76b9719d911017c592"));
    }

    #[test]
    fn test_clear_size_parsing() {
        let mut metadata = HashMap::new();
        assert_eq!(clear_size(&metadata), None);

        metadata.insert(meta::CLEAR_SIZE.to_string(), "4096".to_string());
        assert_eq!(clear_size(&metadata), Some(4096));

        metadata.insert(meta::CLEAR_SIZE.to_string(), "not-a-size".to_string());
        assert_eq!(clear_size(&metadata), None);
    }
}
