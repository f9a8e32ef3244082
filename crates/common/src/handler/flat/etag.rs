use futures::TryStreamExt;
use md5::{Digest, Md5};

use crate::branch::{Identifier, StorageType};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::meta;
use crate::models::{ByteStream, GetRequestData};
use crate::node::Node;

/// Hex MD5 of a whole object body. The stream is consumed here and dropped
///  on every return path.
async fn md5_hex(mut body: ByteStream) -> Result<String> {
    let mut hasher = Md5::new();
    while let Some(chunk) = body.try_next().await.map_err(Error::object_store)? {
        hasher.update(&chunk);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Obtain a true content hash for the blob of `node` on the branch selected
///  by `identifier`.
///
/// Objects above the client's multipart-copy threshold on remote storages
///  cannot be copied onto themselves in one call: they are hashed by
///  streaming them, and the digest is stored as object metadata through a
///  multipart in-place copy. Everything else is copied in place with the
///  `REPLACE` directive, which makes the store compute a fresh etag.
pub async fn recompute_etag(
    ctx: &RequestContext,
    identifier: Identifier,
    node: &Node,
) -> Result<String> {
    let branch = ctx.require_branch(identifier)?;
    let client = &branch.client;
    let bucket = branch.bucket.as_str();
    let key = branch.object_key(node)?;

    let mut copy_meta = ctx.metadata().clone();
    copy_meta.insert(
        meta::METADATA_DIRECTIVE.to_string(),
        meta::DIRECTIVE_REPLACE.to_string(),
    );

    let info = client.stat_object(bucket, &key, ctx.metadata()).await?;
    copy_meta.extend(info.metadata.clone());

    let threshold = client.copy_object_multipart_threshold();
    if threshold > 0 && info.size > threshold && branch.storage_type != StorageType::Local {
        tracing::debug!(
            key = %key,
            size = info.size,
            threshold,
            "object too large for in-place copy, hashing content"
        );
        let body = client
            .get_object(bucket, &key, &GetRequestData::default())
            .await?;
        let checksum = md5_hex(body).await?;

        copy_meta.insert(meta::CONTENT_MD5.to_string(), checksum.clone());
        client
            .copy_object_multipart(&info, bucket, &key, bucket, &key, &copy_meta)
            .await?;
        return Ok(checksum);
    }

    let copied = client
        .copy_object(bucket, &key, bucket, &key, &copy_meta)
        .await?;
    Ok(copied.etag)
}
