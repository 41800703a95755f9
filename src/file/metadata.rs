//! File metadata entity and repository.

use serde::Serialize;
use sqlx::FromRow;

use crate::db::DbPool;
use crate::{datetime, Result};

/// Metadata row for a stored file.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub user_id: i64,
    pub folder_id: Option<i64>,
    pub original_name: String,
    /// Opaque blob handle; never derived from the user-supplied name.
    #[serde(skip)]
    pub stored_name: String,
    pub size: i64,
    pub mime_type: String,
    #[serde(skip)]
    pub content_hash: String,
    pub is_public: bool,
    pub uploaded_at: String,
    #[serde(skip)]
    pub deleted: bool,
    #[serde(skip)]
    pub deleted_at: Option<String>,
}

/// Fields for a new metadata row.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub user_id: i64,
    pub folder_id: Option<i64>,
    pub original_name: String,
    pub stored_name: String,
    pub size: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub is_public: bool,
}

/// Repository for file metadata.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: DbPool,
}

impl FileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let row = sqlx::query_as::<_, FileRecord>(
            "INSERT INTO files
                (user_id, folder_id, original_name, stored_name, size,
                 mime_type, content_hash, is_public, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(record.user_id)
        .bind(record.folder_id)
        .bind(&record.original_name)
        .bind(&record.stored_name)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.content_hash)
        .bind(record.is_public)
        .bind(datetime::now_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// A live file the caller may read: their own, or anyone's public one.
    pub async fn get_readable(&self, user_id: i64, file_id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files
             WHERE id = $1 AND deleted = 0 AND (user_id = $2 OR is_public = 1)",
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Live files in a folder (or at the root when `folder_id` is None).
    pub async fn list_in_folder(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<Vec<FileRecord>> {
        let rows = match folder_id {
            Some(folder_id) => {
                sqlx::query_as::<_, FileRecord>(
                    "SELECT * FROM files
                     WHERE user_id = $1 AND folder_id = $2 AND deleted = 0
                     ORDER BY original_name",
                )
                .bind(user_id)
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, FileRecord>(
                    "SELECT * FROM files
                     WHERE user_id = $1 AND folder_id IS NULL AND deleted = 0
                     ORDER BY original_name",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Remove a metadata row outright (upload compensation path).
    pub async fn delete_row(&self, file_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
