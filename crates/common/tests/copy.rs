//! Integration tests for copies into flat storages

mod common;

use ::common::meta;
use ::common::models::{CopyRequestData, PutRequestData};
use ::common::prelude::*;
use ::common::testkit::{Event, IndexOp, ObjectOp};

#[tokio::test]
async fn test_copy_reserves_then_finalizes_destination() {
    let h = common::Harness::new();
    let from = h
        .put_with(
            "pydata/src.txt",
            b"some content",
            PutRequestData::new(12).with_meta(meta::CONTENT_TYPE, "text/plain"),
        )
        .await;
    h.journal.clear();

    let mut to = Node::new("pydata/dst.txt");
    let copied = h
        .pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &CopyRequestData::default())
        .await
        .unwrap();
    assert_eq!(copied, 12);

    // exactly one reservation, made before any data moved
    let reservations = h.temporary_creates();
    assert_eq!(reservations.len(), 1);
    let copy_at = h
        .journal
        .position(|e| matches!(e, Event::Object(call) if call.op == ObjectOp::Copy))
        .unwrap();
    assert!(reservations[0] < copy_at);

    let stored = h.index.get_by_path("pydata/dst.txt").unwrap();
    assert_eq!(stored.uuid, to.uuid);
    assert_ne!(stored.uuid, from.uuid);
    assert!(!stored.is_temporary());
    assert_eq!(stored.etag, common::md5_hex(b"some content"));
    assert_eq!(stored.size, 12);
    assert_eq!(stored.mime(), Some("text/plain"));
    assert_eq!(h.read(&stored).await, b"some content");
}

#[tokio::test]
async fn test_failed_copy_reverts_reservation() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"content").await;
    h.journal.clear();
    h.client.fail(ObjectOp::Copy);

    let mut to = Node::new("pydata/dst.txt");
    let err = h
        .pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &CopyRequestData::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { .. }));
    assert_eq!(h.temporary_creates().len(), 1);
    assert!(h.index.get_by_path("pydata/dst.txt").is_none());
    assert!(h
        .journal
        .events()
        .iter()
        .any(|e| matches!(e, Event::Index { op: IndexOp::Delete, path, .. } if path == "pydata/dst.txt")));
    // the source is untouched
    assert!(h.index.get(&from.uuid).is_some());
}

#[tokio::test]
async fn test_failed_revert_still_returns_copy_error() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"content").await;
    h.client.fail(ObjectOp::Copy);
    h.index.fail(IndexOp::Delete);

    let mut to = Node::new("pydata/dst.txt");
    let err = h
        .pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &CopyRequestData::default())
        .await
        .unwrap_err();

    // the copy failure is reported, not the index one
    assert!(err.to_string().starts_with("object store call failed"));
    assert!(h.index.get_by_path("pydata/dst.txt").unwrap().is_temporary());
}

#[tokio::test]
async fn test_failed_sync_preserves_temporary_node() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"content").await;
    h.client.fail(ObjectOp::Stat);

    let mut to = Node::new("pydata/dst.txt");
    let result = h
        .pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &CopyRequestData::default())
        .await;

    assert!(result.is_err());
    let orphan = h.index.get_by_path("pydata/dst.txt").unwrap();
    assert!(orphan.is_temporary());
    assert!(h.client.object(common::BUCKET, &orphan.uuid).is_some());
}

#[tokio::test]
async fn test_version_restore_skips_reservation() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"old version").await;
    let existing = h.put("pydata/dst.txt", b"current").await;
    h.journal.clear();

    let request = CopyRequestData {
        src_version_id: Some("v-1".to_string()),
        ..Default::default()
    };
    let mut to = Node::new("pydata/dst.txt");
    h.pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &request)
        .await
        .unwrap();

    assert!(h.temporary_creates().is_empty());
    assert_eq!(to.uuid, existing.uuid);
    let restored = h.index.get(&existing.uuid).unwrap();
    assert_eq!(restored.etag, common::md5_hex(b"old version"));
}

#[tokio::test]
async fn test_explicit_destination_uuid_is_used() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"content").await;

    let request = CopyRequestData::default().with_meta(meta::NODE_UUID, "chosen-uuid");
    let mut to = Node::new("pydata/dst.txt");
    h.pipeline
        .copy_object(&h.copy_ctx(), &from, &mut to, &request)
        .await
        .unwrap();

    assert_eq!(to.uuid, "chosen-uuid");
    assert_eq!(h.index.get_by_path("pydata/dst.txt").unwrap().uuid, "chosen-uuid");
    assert!(h.client.object(common::BUCKET, "chosen-uuid").is_some());
}

#[tokio::test]
async fn test_copy_into_hierarchical_storage_passes_through() {
    let h = common::Harness::new();
    let from = h.put("pydata/src.txt", b"content").await;
    let tree = BranchInfo::new("tree", "tree-bucket", h.client.clone());
    let ctx = h
        .ctx()
        .with_branch(Identifier::From, h.branch())
        .with_branch(Identifier::To, tree);
    h.journal.clear();

    let mut to = Node::new("tree/docs/src.txt");
    h.pipeline
        .copy_object(&ctx, &from, &mut to, &CopyRequestData::default())
        .await
        .unwrap();

    assert!(h.temporary_creates().is_empty());
    assert!(to.uuid.is_empty());
    assert_eq!(
        h.client.object_data("tree-bucket", "docs/src.txt").unwrap().as_ref(),
        b"content"
    );
}
