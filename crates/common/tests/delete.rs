//! Integration tests for node deletion on flat storages

mod common;

use ::common::prelude::*;
use ::common::testkit::ObjectOp;

#[tokio::test]
async fn test_failed_blob_delete_keeps_index_entry() {
    let h = common::Harness::new();
    let node = h.put("pydata/keep.txt", b"data").await;
    h.client.fail(ObjectOp::Remove);

    let result = h.pipeline.delete_node(&h.ctx(), &node).await;

    assert!(result.is_err());
    assert!(h.index.get(&node.uuid).is_some());
    assert!(h.client.object(common::BUCKET, &node.uuid).is_some());
}

#[tokio::test]
async fn test_leaf_delete_removes_blob_then_index() {
    let h = common::Harness::new();
    let node = h.put("pydata/gone.txt", b"data").await;

    let deleted = h.pipeline.delete_node(&h.ctx(), &node).await.unwrap();

    assert!(deleted);
    assert!(h.index.get(&node.uuid).is_none());
    assert!(h.client.object(common::BUCKET, &node.uuid).is_none());
}

#[tokio::test]
async fn test_delete_by_path_resolves_node() {
    let h = common::Harness::new();
    let node = h.put("pydata/by-path.txt", b"data").await;

    // type and identity unknown to the caller
    let deleted = h
        .pipeline
        .delete_node(&h.ctx(), &Node::new("pydata/by-path.txt"))
        .await
        .unwrap();

    assert!(deleted);
    assert!(h.index.is_empty());
    assert!(h.client.object(common::BUCKET, &node.uuid).is_none());
}

#[tokio::test]
async fn test_folder_delete_only_touches_index() {
    let h = common::Harness::new();
    let folder = h.index.insert(Node::collection("pydata/photos"));

    let deleted = h.pipeline.delete_node(&h.ctx(), &folder).await.unwrap();

    assert!(deleted);
    assert!(h.index.is_empty());
    assert!(h.client.calls().is_empty());
}
