//! SQLite database for object and multipart upload metadata.

use std::collections::HashMap;
use std::path::Path;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};

use crate::error::Result;

/// Object metadata stored in SQLite.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObjectRecord {
    pub bucket: String,
    pub key: String,
    pub size: i64,
    pub etag: String,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Unix milliseconds
    pub last_modified: i64,
}

/// An open multipart upload.
#[derive(Debug, Clone)]
pub(crate) struct UploadRecord {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub metadata: HashMap<String, String>,
}

/// A staged part of an open upload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PartRecord {
    pub part_number: u32,
    pub etag: String,
    pub size: i64,
    pub last_modified: i64,
}

/// SQLite database connection pool.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection from a file path.
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace an object record.
    pub async fn upsert_object(&self, record: &ObjectRecord) -> Result<()> {
        let metadata = serde_json::to_string(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO objects (bucket, key, size, etag, content_type, metadata, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                size = excluded.size,
                etag = excluded.etag,
                content_type = excluded.content_type,
                metadata = excluded.metadata,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(&record.bucket)
        .bind(&record.key)
        .bind(record.size)
        .bind(&record.etag)
        .bind(&record.content_type)
        .bind(metadata)
        .bind(record.last_modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get object metadata by bucket and key.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectRecord>> {
        let row = sqlx::query(
            r#"
            SELECT bucket, key, size, etag, content_type, metadata, last_modified
            FROM objects
            WHERE bucket = ? AND key = ?
            "#,
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| object_from_row(&r)).transpose()
    }

    /// Delete an object record.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM objects WHERE bucket = ? AND key = ?
            "#,
        )
        .bind(bucket)
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Register a new multipart upload.
    pub async fn insert_upload(&self, upload: &UploadRecord) -> Result<()> {
        let metadata = serde_json::to_string(&upload.metadata)?;
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO uploads (upload_id, bucket, key, metadata, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&upload.upload_id)
        .bind(&upload.bucket)
        .bind(&upload.key)
        .bind(metadata)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an open upload by id.
    pub async fn get_upload(&self, upload_id: &str) -> Result<Option<UploadRecord>> {
        let row = sqlx::query(
            r#"
            SELECT upload_id, bucket, key, metadata
            FROM uploads
            WHERE upload_id = ?
            "#,
        )
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<UploadRecord> {
            Ok(UploadRecord {
                upload_id: r.get("upload_id"),
                bucket: r.get("bucket"),
                key: r.get("key"),
                metadata: serde_json::from_str(r.get("metadata"))?,
            })
        })
        .transpose()
    }

    /// Delete an upload and, through the foreign key, its parts.
    pub async fn delete_upload(&self, upload_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM uploads WHERE upload_id = ?
            "#,
        )
        .bind(upload_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or replace a staged part.
    pub async fn upsert_part(&self, upload_id: &str, part: &PartRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parts (upload_id, part_number, etag, size, last_modified)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(upload_id, part_number) DO UPDATE SET
                etag = excluded.etag,
                size = excluded.size,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(upload_id)
        .bind(part.part_number as i64)
        .bind(&part.etag)
        .bind(part.size)
        .bind(part.last_modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List parts numbered above `after`, at most `limit` of them.
    pub async fn list_parts(&self, upload_id: &str, after: u32, limit: u32) -> Result<Vec<PartRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT part_number, etag, size, last_modified
            FROM parts
            WHERE upload_id = ? AND part_number > ?
            ORDER BY part_number ASC
            LIMIT ?
            "#,
        )
        .bind(upload_id)
        .bind(after as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(part_from_row).collect())
    }
}

fn object_from_row(r: &SqliteRow) -> Result<ObjectRecord> {
    Ok(ObjectRecord {
        bucket: r.get("bucket"),
        key: r.get("key"),
        size: r.get("size"),
        etag: r.get("etag"),
        content_type: r.get("content_type"),
        metadata: serde_json::from_str(r.get("metadata"))?,
        last_modified: r.get("last_modified"),
    })
}

fn part_from_row(r: &SqliteRow) -> PartRecord {
    PartRecord {
        part_number: r.get::<i64, _>("part_number") as u32,
        etag: r.get("etag"),
        size: r.get("size"),
        last_modified: r.get("last_modified"),
    }
}

#[cfg(test)]
impl Database {
    /// Count objects.
    pub async fn count_objects(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM objects
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }
}
