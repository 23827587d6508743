//! File-based secondary storage backend.
//!
//! Stores one file per blob with a 2-level fan-out directory structure:
//! `{base_dir}/{hex[0..2]}/{hex[2..4]}/{hex}`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use quay_types::{BackendType, BlobKey};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::PrecomputedKeyStore;

/// File-based object store with 2-level fan-out directory layout.
///
/// Each blob is stored as a file at:
/// `{base_dir}/{hex(key)[0..2]}/{hex(key)[2..4]}/{hex(key)}`.
///
/// Writes are atomic: data is written to a temporary file first, then
/// renamed into place, so a reader never observes a half-written blob.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Root directory of this store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Compute the full file path for a key.
    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        let hex = key.to_string();
        self.base_dir.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
    }
}

#[async_trait::async_trait]
impl PrecomputedKeyStore for FileStore {
    async fn put(&self, key: BlobKey, value: Bytes) -> Result<(), StoreError> {
        let path = self.blob_path(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Concurrent workers may write the same key; a per-write temp name
        // keeps their renames from clobbering each other's partial files.
        let tmp_path = path.with_extension(format!("tmp{}", rand::random::<u32>()));
        let written = match tokio::fs::write(&tmp_path, &value).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }

        debug!(%key, path = %path.display(), size = value.len(), "stored blob to file");
        Ok(())
    }

    async fn get(&self, key: BlobKey) -> Result<Option<Bytes>, StoreError> {
        let path = self.blob_path(&key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn backend_type(&self) -> BackendType {
        BackendType::File
    }
}
