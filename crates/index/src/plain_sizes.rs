use async_trait::async_trait;
use sqlx::Row;

use common::prelude::{Error, KeyManager, Result};

use crate::Database;

impl Database {
    /// Record the plaintext size of an encrypted node for a key owner
    pub async fn set_plain_size(
        &self,
        node_uuid: &str,
        owner: &str,
        plain_size: i64,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO plain_sizes (node_uuid, owner, plain_size)
            VALUES (?, ?, ?)
            ON CONFLICT(node_uuid, owner) DO UPDATE SET
                plain_size = excluded.plain_size
            "#,
        )
        .bind(node_uuid)
        .bind(owner)
        .bind(plain_size)
        .execute(&**self)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyManager for Database {
    async fn plain_size(&self, node_uuid: &str, owner: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT plain_size FROM plain_sizes
            WHERE node_uuid = ? AND owner = ?
            "#,
        )
        .bind(node_uuid)
        .bind(owner)
        .fetch_optional(&**self)
        .await
        .map_err(Error::key_manager)?;

        row.map(|r| r.get("plain_size")).ok_or_else(|| {
            Error::NotFound(format!("no key info for node {} and owner {}", node_uuid, owner))
        })
    }
}
