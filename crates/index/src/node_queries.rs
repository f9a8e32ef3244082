use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use common::prelude::{Error, IndexClient, Node, NodeType, Result};

use crate::Database;

/// Map a query failure; a taken path surfaces as a conflict
fn index_error(err: sqlx::Error) -> Error {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        return Error::Conflict(format!("path is taken by another node: {}", err));
    }
    Error::index(err)
}

fn node_from_row(row: &SqliteRow) -> Result<Node> {
    let meta: String = row.get("meta");
    Ok(Node {
        uuid: row.get("uuid"),
        path: row.get("path"),
        node_type: NodeType::parse(row.get("node_type")),
        size: row.get("size"),
        mtime: row.get("mtime"),
        etag: row.get("etag"),
        meta: serde_json::from_str(&meta).map_err(Error::index)?,
    })
}

async fn node_by_uuid(conn: &mut SqliteConnection, uuid: &str) -> Result<Option<Node>> {
    let row = sqlx::query(
        r#"
        SELECT uuid, path, node_type, size, mtime, etag, meta
        FROM nodes
        WHERE uuid = ?
        "#,
    )
    .bind(uuid)
    .fetch_optional(conn)
    .await
    .map_err(index_error)?;
    row.as_ref().map(node_from_row).transpose()
}

async fn node_by_path(conn: &mut SqliteConnection, path: &str) -> Result<Option<Node>> {
    let row = sqlx::query(
        r#"
        SELECT uuid, path, node_type, size, mtime, etag, meta
        FROM nodes
        WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(conn)
    .await
    .map_err(index_error)?;
    row.as_ref().map(node_from_row).transpose()
}

/// By uuid when the node carries one, by path otherwise
async fn lookup(conn: &mut SqliteConnection, node: &Node) -> Result<Option<Node>> {
    if node.uuid.is_empty() {
        node_by_path(conn, &node.path).await
    } else {
        node_by_uuid(conn, &node.uuid).await
    }
}

impl Database {
    /// Number of index entries
    pub async fn count_nodes(&self) -> std::result::Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM nodes")
            .fetch_one(&**self)
            .await?;
        Ok(row.get("count"))
    }

    /// Entries whose path sits under `prefix`, ordered by path
    pub async fn list_nodes(&self, prefix: &str) -> Result<Vec<Node>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            r#"
            SELECT uuid, path, node_type, size, mtime, etag, meta
            FROM nodes
            WHERE path LIKE ? ESCAPE '\'
            ORDER BY path ASC
            "#,
        )
        .bind(pattern)
        .fetch_all(&**self)
        .await
        .map_err(index_error)?;
        rows.iter().map(node_from_row).collect()
    }
}

#[async_trait]
impl IndexClient for Database {
    async fn create_node(&self, node: &Node, update_if_exists: bool) -> Result<Node> {
        let mut tx = self.begin().await.map_err(index_error)?;

        let by_uuid = if node.uuid.is_empty() {
            None
        } else {
            node_by_uuid(&mut tx, &node.uuid).await?
        };
        let by_path = node_by_path(&mut tx, &node.path).await?;

        let (uuid, exists) = match (by_uuid, by_path) {
            (Some(_), Some(at_path)) if at_path.uuid != node.uuid => {
                return Err(Error::Conflict(format!(
                    "path '{}' is taken by another node",
                    node.path
                )));
            }
            (Some(existing), _) | (None, Some(existing)) => {
                if !update_if_exists {
                    return Err(Error::Conflict(format!(
                        "node already exists at '{}'",
                        existing.path
                    )));
                }
                if !node.uuid.is_empty() && existing.uuid != node.uuid {
                    return Err(Error::Conflict(format!(
                        "path '{}' is taken by another node",
                        node.path
                    )));
                }
                (existing.uuid, true)
            }
            (None, None) if node.uuid.is_empty() => (Uuid::new_v4().to_string(), false),
            (None, None) => (node.uuid.clone(), false),
        };

        let mut stored = node.clone();
        stored.uuid = uuid;
        let meta = serde_json::to_string(&stored.meta).map_err(Error::index)?;

        let query = if exists {
            r#"
            UPDATE nodes
            SET path = ?2, node_type = ?3, size = ?4, mtime = ?5, etag = ?6, meta = ?7
            WHERE uuid = ?1
            "#
        } else {
            r#"
            INSERT INTO nodes (uuid, path, node_type, size, mtime, etag, meta)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#
        };
        sqlx::query(query)
            .bind(&stored.uuid)
            .bind(&stored.path)
            .bind(stored.node_type.as_str())
            .bind(stored.size)
            .bind(stored.mtime)
            .bind(&stored.etag)
            .bind(meta)
            .execute(&mut *tx)
            .await
            .map_err(index_error)?;

        tx.commit().await.map_err(index_error)?;
        tracing::debug!(
            uuid = %stored.uuid,
            path = %stored.path,
            etag = %stored.etag,
            updated = exists,
            "index entry written"
        );
        Ok(stored)
    }

    async fn read_node(&self, node: &Node) -> Result<Node> {
        let mut conn = self.acquire().await.map_err(index_error)?;
        lookup(&mut conn, node)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node at '{}'", node.path)))
    }

    async fn delete_node(&self, node: &Node) -> Result<bool> {
        let result = if node.uuid.is_empty() {
            sqlx::query("DELETE FROM nodes WHERE path = ?")
                .bind(&node.path)
                .execute(&**self)
                .await
        } else {
            sqlx::query("DELETE FROM nodes WHERE uuid = ?")
                .bind(&node.uuid)
                .execute(&**self)
                .await
        }
        .map_err(index_error)?;

        let removed = result.rows_affected() > 0;
        tracing::debug!(uuid = %node.uuid, path = %node.path, removed, "index entry deleted");
        Ok(removed)
    }
}
