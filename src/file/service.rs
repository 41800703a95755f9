//! Quota-checked file gateway.
//!
//! Upload is all-or-nothing: quota is reserved with an atomic conditional
//! update before any bytes touch disk, and every failure after the
//! reservation compensates by releasing it and removing whatever was
//! written.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditLog, AuditSeverity};
use crate::db::user::UserRepository;
use crate::db::DbPool;
use crate::file::folder::{Folder, FolderRepository};
use crate::file::metadata::{FileRecord, FileRepository, NewFileRecord};
use crate::file::storage::{content_hash, BlobStore};
use crate::{Result, StratusError};

/// Contents of one folder level: subfolders plus files.
#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    /// The folder being listed, absent for the root.
    pub folder: Option<Folder>,
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}

/// Upload, download and folder operations behind ownership and quota
/// checks.
#[derive(Debug, Clone)]
pub struct FileService {
    users: UserRepository,
    folders: FolderRepository,
    files: FileRepository,
    store: BlobStore,
    audit: AuditLog,
}

impl FileService {
    pub fn new(pool: DbPool, store: BlobStore) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            folders: FolderRepository::new(pool.clone()),
            files: FileRepository::new(pool.clone()),
            store,
            audit: AuditLog::new(pool),
        }
    }

    /// Store an upload for a user.
    pub async fn upload(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
        filename: &str,
        bytes: &[u8],
        is_public: bool,
        ip: Option<&str>,
    ) -> Result<FileRecord> {
        let extension = crate::file::extension_of(filename)
            .filter(|ext| crate::file::ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| StratusError::UnsupportedType(filename.to_string()))?;

        if let Some(folder_id) = folder_id {
            self.folders
                .get_owned(user_id, folder_id)
                .await?
                .ok_or_else(|| StratusError::NotFound("folder".to_string()))?;
        }

        let size = bytes.len() as i64;
        if let Err(e) = self.users.reserve_storage(user_id, size).await {
            if matches!(e, StratusError::QuotaExceeded) {
                self.audit
                    .record(
                        Some(user_id),
                        AuditCategory::File,
                        AuditSeverity::Warning,
                        "UPLOAD_QUOTA_REFUSED",
                        None,
                        Some(&json!({ "size": size })),
                        ip,
                    )
                    .await;
            }
            return Err(e);
        }

        let stored_name = BlobStore::new_stored_name(&extension);
        if let Err(e) = self.store.write(&stored_name, bytes).await {
            self.users.release_storage(user_id, size).await?;
            return Err(e);
        }

        let record = NewFileRecord {
            user_id,
            folder_id,
            original_name: filename.to_string(),
            stored_name: stored_name.clone(),
            size,
            mime_type: mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string(),
            content_hash: content_hash(bytes),
            is_public,
        };
        let row = match self.files.insert(&record).await {
            Ok(row) => row,
            Err(e) => {
                // Roll back the blob and the reservation together
                if let Err(cleanup) = self.store.delete(&stored_name).await {
                    warn!("failed to remove orphaned blob {stored_name}: {cleanup}");
                }
                self.users.release_storage(user_id, size).await?;
                return Err(e);
            }
        };

        info!(user_id, file_id = row.id, size, "file uploaded");
        self.audit
            .record(
                Some(user_id),
                AuditCategory::File,
                AuditSeverity::Info,
                "FILE_UPLOADED",
                None,
                Some(&json!({ "file_id": row.id, "size": size })),
                ip,
            )
            .await;
        Ok(row)
    }

    /// Fetch a file's metadata and bytes, with an integrity recheck.
    pub async fn download(&self, user_id: i64, file_id: i64) -> Result<(FileRecord, Vec<u8>)> {
        let record = self
            .files
            .get_readable(user_id, file_id)
            .await?
            .ok_or_else(|| StratusError::NotFound("file".to_string()))?;

        let bytes = self.store.read(&record.stored_name).await?;
        if content_hash(&bytes) != record.content_hash {
            warn!(file_id, "stored bytes no longer match recorded hash");
            return Err(StratusError::Corrupt);
        }
        Ok((record, bytes))
    }

    /// List one folder level (root when `folder_id` is None).
    pub async fn list_folder(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
    ) -> Result<FolderListing> {
        let folder = match folder_id {
            Some(folder_id) => Some(
                self.folders
                    .get_owned(user_id, folder_id)
                    .await?
                    .ok_or_else(|| StratusError::NotFound("folder".to_string()))?,
            ),
            None => None,
        };

        let folders = self.folders.list_children(user_id, folder_id).await?;
        let files = self.files.list_in_folder(user_id, folder_id).await?;
        Ok(FolderListing {
            folder,
            folders,
            files,
        })
    }

    /// Create a folder for a user.
    pub async fn create_folder(
        &self,
        user_id: i64,
        name: &str,
        parent_id: Option<i64>,
        ip: Option<&str>,
    ) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StratusError::Invalid("folder name must not be empty".to_string()));
        }

        let parent = match parent_id {
            Some(parent_id) => Some(
                self.folders
                    .get_owned(user_id, parent_id)
                    .await?
                    .ok_or_else(|| StratusError::NotFound("folder".to_string()))?,
            ),
            None => None,
        };

        let folder = self.folders.create(user_id, name, parent.as_ref()).await?;
        self.audit
            .record(
                Some(user_id),
                AuditCategory::File,
                AuditSeverity::Info,
                "FOLDER_CREATED",
                Some(&folder.path),
                None,
                ip,
            )
            .await;
        Ok(folder)
    }
}
