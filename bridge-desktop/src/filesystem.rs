//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Provides async file I/O operations using:
/// - `tokio::fs` for async operations
/// - `fs2` for the free-space query, run on the blocking pool
/// - Platform-specific per-user documents directory
pub struct TokioFileSystem {
    documents_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor rooted at the user's documents directory
    pub fn new() -> Self {
        let documents_dir = dirs::document_dir()
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("Documents")
            });

        Self { documents_dir }
    }

    /// Create a new file system accessor with a custom documents root
    pub fn with_documents_directory(documents_dir: PathBuf) -> Self {
        Self { documents_dir }
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.to_path_buf())
        } else {
            BridgeError::Io(e)
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_documents_directory(&self) -> Result<PathBuf> {
        if !fs::try_exists(&self.documents_dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.documents_dir)
                .await
                .map_err(|e| Self::map_io_error(&self.documents_dir, e))?;
            debug!(path = ?self.documents_dir, "Created documents directory");
        }
        Ok(self.documents_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
            .await
            .map_err(|e| Self::map_io_error(from, e))?;
        debug!(from = ?from, to = ?to, "Moved file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn available_space(&self, path: &Path) -> Result<u64> {
        let path = path.to_path_buf();
        let space = tokio::task::spawn_blocking(move || fs2::available_space(&path))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Free space query panicked: {}", e)))?
            .map_err(BridgeError::Io)?;
        Ok(space)
    }
}
