//! Content-opaque blob store.
//!
//! Bytes live on disk under names that carry no user-supplied content: a
//! fresh uuid plus the original extension. Blobs are sharded into
//! two-character prefix directories to keep any single directory small.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use crate::{Result, StratusError};

/// SHA-256 hex digest of a byte slice.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Filesystem store for uploaded file content.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Generate an opaque stored name for an upload.
    pub fn new_stored_name(extension: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), extension)
    }

    fn blob_path(&self, stored_name: &str) -> PathBuf {
        // uuid names always have at least two leading hex characters
        let shard = &stored_name[..2.min(stored_name.len())];
        self.root.join(shard).join(stored_name)
    }

    /// Write blob bytes, creating shard directories as needed.
    pub async fn write(&self, stored_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(stored_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Read a blob back; `NotFound` when the bytes are missing.
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(stored_name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StratusError::NotFound("file".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob. Missing blobs are not an error.
    pub async fn delete(&self, stored_name: &str) -> Result<()> {
        let path = self.blob_path(stored_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, stored_name: &str) -> bool {
        fs::try_exists(self.blob_path(stored_name))
            .await
            .unwrap_or(false)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
