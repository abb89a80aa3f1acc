use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

use super::{BlobObject, BlobStore};
use crate::error::AppResult;
use crate::state::DbPool;

/// Blobs kept as files under one directory, with metadata in the `blobs` table.
pub struct LocalBlobStore {
    root: PathBuf,
    db: DbPool,
    public_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, db: DbPool, public_url: impl Into<String>) -> Self {
        Self {
            root,
            db,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn record(&self, storage_id: &str) -> AppResult<Option<BlobRecord>> {
        let conn = self.db.get()?;
        let row = conn
            .query_row(
                "SELECT owner_id, file_name, content_type FROM blobs WHERE id = ?1",
                params![storage_id],
                |row| {
                    Ok(BlobRecord {
                        owner_id: row.get(0)?,
                        file_name: row.get(1)?,
                        content_type: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

struct BlobRecord {
    owner_id: String,
    file_name: String,
    content_type: String,
}

fn extension_for(content_type: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first().copied())
        .unwrap_or("bin")
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, owner_id: &str, content_type: &str, bytes: Bytes) -> AppResult<String> {
        let id = uuid::Uuid::now_v7().to_string();
        let file_name = format!("{}.{}", id, extension_for(content_type));

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), &bytes).await?;

        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO blobs (id, owner_id, file_name, content_type, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
            params![id, owner_id, file_name, content_type, bytes.len() as i64],
        )?;

        tracing::debug!(storage_id = %id, size = bytes.len(), content_type, "Blob stored");
        Ok(id)
    }

    async fn url(&self, storage_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .record(storage_id)?
            .map(|_| format!("{}/blobs/{}", self.public_url, storage_id)))
    }

    async fn owner(&self, storage_id: &str) -> AppResult<Option<String>> {
        Ok(self.record(storage_id)?.map(|r| r.owner_id))
    }

    async fn open(&self, storage_id: &str) -> AppResult<Option<BlobObject>> {
        let Some(record) = self.record(storage_id)? else {
            return Ok(None);
        };

        match tokio::fs::read(self.root.join(&record.file_name)).await {
            Ok(data) => Ok(Some(BlobObject {
                content_type: record.content_type,
                bytes: Bytes::from(data),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, storage_id: &str) -> AppResult<bool> {
        let Some(record) = self.record(storage_id)? else {
            return Ok(false);
        };

        {
            let conn = self.db.get()?;
            conn.execute("DELETE FROM blobs WHERE id = ?1", params![storage_id])?;
        }

        match tokio::fs::remove_file(self.root.join(&record.file_name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(storage_id, "Blob file already missing");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> LocalBlobStore {
        let pool = crate::db::create_pool(&dir.join("test.db")).unwrap();
        crate::db::run_migrations(&pool).unwrap();
        LocalBlobStore::new(dir.join("uploads"), pool, "http://localhost:3000/")
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/x-unknown-thing"), "bin");
    }

    #[tokio::test]
    async fn put_open_url_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = store(tmp.path());

        let id = blobs
            .put("user-1", "image/png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();

        assert_eq!(
            blobs.url(&id).await.unwrap(),
            Some(format!("http://localhost:3000/blobs/{}", id))
        );
        assert_eq!(blobs.owner(&id).await.unwrap().as_deref(), Some("user-1"));
        let object = blobs.open(&id).await.unwrap().unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(&object.bytes[..], b"\x89PNG");

        assert!(blobs.delete(&id).await.unwrap());
        assert!(blobs.url(&id).await.unwrap().is_none());
        assert!(blobs.open(&id).await.unwrap().is_none());
        assert!(!blobs.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_storage_id_has_no_url() {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = store(tmp.path());
        assert!(blobs.url("nope").await.unwrap().is_none());
        assert!(blobs.owner("nope").await.unwrap().is_none());
    }
}
