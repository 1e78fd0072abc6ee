//! Storage and File System Abstractions
//!
//! Provides a platform-agnostic trait for the file operations the audio cache
//! needs: directory creation and listing, metadata, moves, deletes and a
//! free-space query on the cache volume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

impl FileMetadata {
    /// Metadata for a regular file.
    pub fn file(size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            size,
            modified_at: Some(modified_at),
            is_directory: false,
        }
    }
}

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn cache_root(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let documents = fs.get_documents_directory().await?;
///     let cache = documents.join("AudioFiles");
///     fs.create_dir_all(&cache).await?;
///     Ok(cache)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's per-user documents directory
    async fn get_documents_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Move a file, replacing nothing: fails if the destination cannot be written
    async fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory (non-recursive)
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Free bytes available to the app on the volume holding `path`
    async fn available_space(&self, path: &Path) -> Result<u64>;
}

/// Returns `true` for dot-files, which the cache never counts or deletes.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
