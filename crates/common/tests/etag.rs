//! Integration tests for etag recomputation strategies

mod common;

use ::common::handler::flat::recompute_etag;
use ::common::meta;
use ::common::models::{stream_from_bytes, MultipartRequestData, PutRequestData};
use ::common::prelude::*;
use ::common::testkit::ObjectOp;

const PAYLOAD: &[u8] = b"0123456789abcdefghij";

/// Seed an object carrying a composite etag, as a multipart upload leaves it
fn seeded(h: &common::Harness) -> Node {
    h.client
        .insert_object(common::BUCKET, "big-uuid", PAYLOAD.to_vec(), "3858f62230ac3c915f300c664312c63f-2");
    h.index.insert(Node::leaf("pydata/big.bin").with_uuid("big-uuid"))
}

#[tokio::test]
async fn test_small_object_is_copied_in_place() {
    let h = common::Harness::with_branch(|b| b.with_storage_type(StorageType::S3));
    h.client.set_multipart_copy_threshold(100);
    let node = seeded(&h);

    let etag = recompute_etag(&h.ctx(), Identifier::In, &node).await.unwrap();

    assert_eq!(etag, common::md5_hex(PAYLOAD));
    assert_eq!(h.client.call_count(ObjectOp::Copy), 1);
    assert_eq!(h.client.call_count(ObjectOp::Get), 0);
}

#[tokio::test]
async fn test_large_remote_object_is_hashed() {
    let h = common::Harness::with_branch(|b| b.with_storage_type(StorageType::S3));
    h.client.set_multipart_copy_threshold(10);
    let node = seeded(&h);

    let etag = recompute_etag(&h.ctx(), Identifier::In, &node).await.unwrap();

    assert_eq!(etag, common::md5_hex(PAYLOAD));
    assert_eq!(h.client.call_count(ObjectOp::Get), 1);
    assert_eq!(h.client.call_count(ObjectOp::CopyMultipart), 1);
    assert_eq!(h.client.call_count(ObjectOp::Copy), 0);

    let stored = h.client.object(common::BUCKET, "big-uuid").unwrap();
    assert_eq!(
        stored.metadata.get(meta::CONTENT_MD5).map(String::as_str),
        Some(etag.as_str())
    );
}

#[tokio::test]
async fn test_large_local_object_uses_in_place_copy() {
    let h = common::Harness::new();
    h.client.set_multipart_copy_threshold(10);
    let node = seeded(&h);

    // the in-place copy is refused above the threshold
    let result = recompute_etag(&h.ctx(), Identifier::In, &node).await;

    assert!(result.is_err());
    assert_eq!(h.client.call_count(ObjectOp::Copy), 1);
    assert_eq!(h.client.call_count(ObjectOp::Get), 0);
    assert_eq!(h.client.call_count(ObjectOp::CopyMultipart), 0);
}

#[tokio::test]
async fn test_failed_recompute_degrades_to_reported_etag() {
    let h = common::Harness::new();
    h.client.set_multipart_copy_threshold(10);
    let ctx = h.ctx();

    let mut target = Node::leaf("pydata/big.bin");
    let upload_id = h
        .pipeline
        .multipart_create(&ctx, &mut target, &MultipartRequestData::default())
        .await
        .unwrap();
    let mut parts = Vec::new();
    for (i, chunk) in PAYLOAD.chunks(10).enumerate() {
        parts.push(
            h.pipeline
                .multipart_put_object_part(
                    &ctx,
                    &mut target,
                    &upload_id,
                    i as u32 + 1,
                    stream_from_bytes(chunk.to_vec()),
                    &PutRequestData::new(chunk.len() as i64),
                )
                .await
                .unwrap(),
        );
    }

    let info = h
        .pipeline
        .multipart_complete(&ctx, &mut target, &upload_id, &parts)
        .await
        .unwrap();

    // the upload succeeds and the index keeps the store-reported etag
    let node = h.index.get(&target.uuid).unwrap();
    assert_eq!(node.etag, info.etag);
    assert!(node.etag.contains('-'));
    assert_eq!(node.size, PAYLOAD.len() as i64);
    assert_eq!(h.client.call_count(ObjectOp::CopyMultipart), 0);
}

#[tokio::test]
async fn test_recompute_requires_branch() {
    let h = common::Harness::new();
    let node = seeded(&h);

    let err = recompute_etag(&h.ctx(), Identifier::To, &node).await.unwrap_err();
    assert!(matches!(err, Error::MissingBranch(Identifier::To)));
}
