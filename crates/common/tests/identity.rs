//! Integration tests for identity resolution on flat storages

mod common;

use std::sync::Arc;

use ::common::handler::{Executor, FlatStorageHandler};
use ::common::models::{collect_stream, GetRequestData};
use ::common::prelude::*;

#[tokio::test]
async fn test_resolve_is_idempotent_without_lookup() {
    let h = common::Harness::new();
    let handler = FlatStorageHandler::new(
        Arc::new(Executor::new(h.index.clone())),
        h.index.clone(),
        h.keys.clone(),
    );
    let mut node = Node::leaf("pydata/any.txt").with_uuid("already-known");

    for _ in 0..2 {
        handler.resolve_identity(&h.ctx(), &mut node).await.unwrap();
        assert_eq!(node.uuid, "already-known");
    }
    assert_eq!(h.index.read_count(), 0);
}

#[tokio::test]
async fn test_get_by_path_resolves_uuid() {
    let h = common::Harness::new();
    let stored = h.put("pydata/notes.txt", b"remember").await;

    let mut node = Node::leaf("pydata/notes.txt");
    let body = h
        .pipeline
        .get_object(&h.ctx(), &mut node, &GetRequestData::default())
        .await
        .unwrap();

    assert_eq!(node.uuid, stored.uuid);
    assert_eq!(collect_stream(body).await.unwrap().as_ref(), b"remember");
}

#[tokio::test]
async fn test_get_with_uuid_skips_lookup() {
    let h = common::Harness::new();
    let stored = h.put("pydata/notes.txt", b"remember").await;
    let reads = h.index.read_count();

    let mut node = stored.clone();
    let body = h
        .pipeline
        .get_object(&h.ctx(), &mut node, &GetRequestData::range(2, 4))
        .await
        .unwrap();

    assert_eq!(collect_stream(body).await.unwrap().as_ref(), b"memb");
    assert_eq!(h.index.read_count(), reads);
}

#[tokio::test]
async fn test_stats_read_by_path() {
    let h = common::Harness::new();
    let stored = h.put("pydata/notes.txt", b"remember").await;

    let stats = h
        .pipeline
        .read_node(&h.ctx(), &Node::new("pydata/notes.txt"), true)
        .await
        .unwrap();

    assert_eq!(stats.uuid, stored.uuid);
    assert_eq!(stats.size, 8);
    assert_eq!(stats.etag, stored.etag);
}

#[tokio::test]
async fn test_missing_branch_is_reported() {
    let h = common::Harness::new();
    let mut node = Node::leaf("pydata/notes.txt").with_uuid("u");

    // no routing at all: the node is not on a flat side, the executor has no branch
    let err = h
        .pipeline
        .get_object(&RequestContext::new(), &mut node, &GetRequestData::default())
        .await
        .err().unwrap();
    assert!(matches!(err, Error::MissingBranch(Identifier::In)));
}
