//! Integration tests for uploads to flat storages

mod common;

use ::common::meta;
use ::common::models::{stream_from_bytes, PutRequestData};
use ::common::prelude::*;
use ::common::testkit::ObjectOp;

#[tokio::test]
async fn test_put_synchronizes_index_from_stats() {
    let h = common::Harness::new();

    let node = h
        .put_with(
            "pydata/docs/readme.md",
            b"# hello",
            PutRequestData::new(7).with_meta(meta::CONTENT_TYPE, "text/markdown"),
        )
        .await;

    assert_eq!(node.path, "pydata/docs/readme.md");
    assert_eq!(node.size, 7);
    assert_eq!(node.etag, common::md5_hex(b"# hello"));
    assert!(node.mtime > 0);
    assert!(node.is_leaf());
    assert_eq!(node.mime(), Some("text/markdown"));
    assert_eq!(h.read(&node).await, b"# hello");
}

#[tokio::test]
async fn test_clear_size_overrides_stored_size() {
    let h = common::Harness::new();
    let ciphertext = vec![7u8; 5000];

    let node = h
        .put_with(
            "pydata/secret.bin",
            &ciphertext,
            PutRequestData::new(5000).with_meta(meta::CLEAR_SIZE, "4096"),
        )
        .await;

    assert_eq!(node.size, 4096);
    assert_eq!(h.client.object(common::BUCKET, &node.uuid).unwrap().size, 5000);
}

#[tokio::test]
async fn test_overwrite_keeps_identity() {
    let h = common::Harness::new();
    let first = h.put("pydata/a.txt", b"v1").await;

    let second = h.put("pydata/a.txt", b"version 2").await;

    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.size, 9);
    assert_eq!(h.index.len(), 1);
    assert_eq!(h.temporary_creates().len(), 1);
}

#[tokio::test]
async fn test_failed_put_reverts_reservation() {
    let h = common::Harness::new();
    h.client.fail(ObjectOp::Put);

    let mut node = Node::leaf("pydata/broken.txt");
    let result = h
        .pipeline
        .put_object(
            &h.ctx(),
            &mut node,
            stream_from_bytes(b"data".to_vec()),
            &PutRequestData::new(4),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(h.temporary_creates().len(), 1);
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_failed_sync_keeps_reservation() {
    let h = common::Harness::new();
    h.client.fail(ObjectOp::Stat);

    let mut node = Node::leaf("pydata/unsynced.txt");
    let result = h
        .pipeline
        .put_object(
            &h.ctx(),
            &mut node,
            stream_from_bytes(b"data".to_vec()),
            &PutRequestData::new(4),
        )
        .await;

    assert!(result.is_err());
    assert!(h.index.get(&node.uuid).unwrap().is_temporary());
    assert!(h.client.object(common::BUCKET, &node.uuid).is_some());
}

#[tokio::test]
async fn test_failed_index_write_fails_put() {
    let h = common::Harness::new();
    let node = h.put("pydata/a.txt", b"v1").await;
    h.index.fail(::common::testkit::IndexOp::Create);

    let mut target = node.clone();
    let err = h
        .pipeline
        .put_object(
            &h.ctx(),
            &mut target,
            stream_from_bytes(b"v2".to_vec()),
            &PutRequestData::new(2),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("index service call failed"));
}
