//! Integration tests for node creation on flat storages

mod common;

use ::common::prelude::*;
use ::common::testkit::{Event, IndexOp};

#[tokio::test]
async fn test_folder_over_file_conflicts_without_touching_storage() {
    let h = common::Harness::new();
    h.put("pydata/report.pdf", b"%PDF").await;
    h.client.clear_calls();

    let err = h
        .pipeline
        .create_node(&h.ctx(), &Node::collection("pydata/report.pdf"), false)
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "unexpected error: {}", err);
    assert!(h.client.calls().is_empty());
    assert!(h.index.get_by_path("pydata/report.pdf").unwrap().is_leaf());
}

#[tokio::test]
async fn test_folder_create_goes_to_index_only() {
    let h = common::Harness::new();

    let created = h
        .pipeline
        .create_node(&h.ctx(), &Node::collection("pydata/photos"), false)
        .await
        .unwrap();

    assert!(created.is_indexed());
    let stored = h.index.get_by_path("pydata/photos").unwrap();
    assert_eq!(stored.uuid, created.uuid);
    assert_eq!(stored.node_type, NodeType::Collection);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_existing_folder_is_returned_as_is() {
    let h = common::Harness::new();
    let existing = h.index.insert(Node::collection("pydata/photos"));
    h.journal.clear();

    let created = h
        .pipeline
        .create_node(&h.ctx(), &Node::collection("pydata/photos"), false)
        .await
        .unwrap();

    assert_eq!(created.uuid, existing.uuid);
    assert!(created.is_indexed());
    assert!(!h
        .journal
        .events()
        .iter()
        .any(|e| matches!(e, Event::Index { op: IndexOp::Create, .. })));
}

#[tokio::test]
async fn test_leaf_create_stores_empty_blob_under_uuid() {
    let h = common::Harness::new();

    let created = h
        .pipeline
        .create_node(&h.ctx(), &Node::leaf("pydata/empty.txt"), false)
        .await
        .unwrap();

    assert!(!created.uuid.is_empty());
    assert_eq!(created.size, 0);
    assert_eq!(created.etag, common::md5_hex(b""));
    assert!(!created.is_temporary());
    assert!(h.client.object(common::BUCKET, &created.uuid).is_some());
}

#[tokio::test]
async fn test_hierarchical_folder_create_passes_through() {
    let h = common::Harness::with_branch(|b| b.with_mode(StorageMode::Hierarchical));

    h.pipeline
        .create_node(&h.ctx(), &Node::collection("pydata/photos"), false)
        .await
        .unwrap();

    // no flat handling: the index is left to the hierarchical sync
    assert!(h.index.is_empty());
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_file_over_folder_conflicts() {
    let h = common::Harness::new();
    h.index.insert(Node::collection("pydata/photos"));

    let err = h
        .pipeline
        .create_node(&h.ctx(), &Node::leaf("pydata/photos"), false)
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "unexpected error: {}", err);
    assert!(h.client.calls().is_empty());
    assert!(h.temporary_creates().is_empty());
}
