//! # Cache Directory
//!
//! Filesystem-backed store mapping remote URLs to local audio files.
//!
//! There is no manifest: a cache entry is a file in the cache folder named by
//! the last path segment of its remote URL, and the file's size and
//! modification time are the only metadata. Hidden entries (dot-files, the
//! `.partial` download folder) are never counted, pruned or cleared.

use crate::cache::config::CacheConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::storage::{is_hidden, FileSystemAccess};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Hidden folder holding in-progress downloads.
pub const PARTIAL_DIRECTORY: &str = ".partial";

/// One cached file.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    /// Files removed, oldest first.
    pub deleted: Vec<PathBuf>,
    pub bytes_freed: u64,
    /// Bytes the pass aimed to free; zero when the cache was within budget.
    pub bytes_to_free: u64,
}

impl PruneReport {
    /// Whether the pass ran out of candidates before reaching its target.
    pub fn shortfall(&self) -> u64 {
        self.bytes_to_free.saturating_sub(self.bytes_freed)
    }
}

/// The cache folder and its size policy.
pub struct CacheDirectory {
    root: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
    config: CacheConfig,
}

impl CacheDirectory {
    /// Describe the cache folder under `documents_root`. No I/O.
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        documents_root: impl AsRef<Path>,
        config: CacheConfig,
    ) -> Self {
        let root = documents_root.as_ref().join(&config.cache_directory);
        Self { root, fs, config }
    }

    /// Create the cache folder.
    ///
    /// The composition root reports a failure and carries on; operations that
    /// need the folder then fail one by one.
    #[instrument(skip(self), fields(root = ?self.root))]
    pub async fn initialize(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.root)
            .await
            .map_err(|e| PlaybackError::DirectoryCreationFailed {
                path: self.root.clone(),
                message: e.to_string(),
            })?;

        info!("Cache directory ready at {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn file_system(&self) -> Arc<dyn FileSystemAccess> {
        Arc::clone(&self.fs)
    }

    /// Folder for in-progress downloads.
    pub fn partial_directory(&self) -> PathBuf {
        self.root.join(PARTIAL_DIRECTORY)
    }

    /// Local path for `remote_url`: the URL's last path segment inside the
    /// cache folder.
    ///
    /// Two URLs ending in the same segment share one cache entry.
    pub fn local_path(&self, remote_url: &str) -> Result<PathBuf> {
        let name = file_name_for_url(remote_url)
            .ok_or_else(|| PlaybackError::InvalidRemoteUrl(remote_url.to_string()))?;
        Ok(self.root.join(name))
    }

    /// Whether `remote_url` is already cached.
    pub async fn exists(&self, remote_url: &str) -> Result<bool> {
        let path = self.local_path(remote_url)?;
        Ok(self.fs.exists(&path).await?)
    }

    /// Every visible regular file in the cache folder.
    ///
    /// Entries whose metadata cannot be read are skipped with a warning. A
    /// failure to list the folder itself is returned.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let paths = self.fs.list_directory(&self.root).await?;
        let mut entries = Vec::with_capacity(paths.len());

        for path in paths.into_iter().filter(|p| !is_hidden(p)) {
            match self.fs.metadata(&path).await {
                Ok(metadata) if metadata.is_directory => {}
                Ok(metadata) => entries.push(CacheEntry {
                    path,
                    size: metadata.size,
                    modified_at: metadata.modified_at,
                }),
                Err(e) => {
                    warn!("Skipping unreadable cache entry {:?}: {}", path, e);
                }
            }
        }

        Ok(entries)
    }

    /// Total bytes of all visible cached files.
    ///
    /// Never fails: unreadable entries count as zero and a folder that cannot
    /// be listed has size zero.
    pub async fn current_size(&self) -> u64 {
        match self.entries().await {
            Ok(entries) => entries.iter().map(|e| e.size).sum(),
            Err(e) => {
                warn!("Failed to list cache directory {:?}: {}", self.root, e);
                0
            }
        }
    }

    /// Delete the oldest files until the cache fits in `max_size_bytes`.
    ///
    /// When over budget, the pass frees `current - max + prune_buffer` bytes,
    /// deleting files in ascending modification time and never touching a
    /// path in `exclude`. Files that fail to delete are skipped. Running out
    /// of candidates is logged, not returned.
    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    pub async fn prune(&self, max_size_bytes: u64, exclude: &[PathBuf]) -> Result<PruneReport> {
        let entries = self
            .entries()
            .await
            .map_err(|e| PlaybackError::CachePruneFailed(e.to_string()))?;
        let current: u64 = entries.iter().map(|e| e.size).sum();

        if current <= max_size_bytes {
            debug!(current, max_size_bytes, "Cache within budget");
            return Ok(PruneReport::default());
        }

        let bytes_to_free = current - max_size_bytes + self.config.prune_buffer_bytes;
        let excluded: HashSet<&Path> = exclude.iter().map(PathBuf::as_path).collect();

        let mut candidates: Vec<CacheEntry> = entries
            .into_iter()
            .filter(|e| !excluded.contains(e.path.as_path()))
            .collect();
        candidates.sort_by(|a, b| {
            a.modified_at
                .cmp(&b.modified_at)
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut report = PruneReport {
            bytes_to_free,
            ..PruneReport::default()
        };

        for candidate in candidates {
            if report.bytes_freed >= bytes_to_free {
                break;
            }
            match self.fs.delete_file(&candidate.path).await {
                Ok(()) => {
                    debug!("Pruned {:?} ({} bytes)", candidate.path, candidate.size);
                    report.bytes_freed += candidate.size;
                    report.deleted.push(candidate.path);
                }
                Err(e) => {
                    warn!("Failed to prune {:?}: {}", candidate.path, e);
                }
            }
        }

        if report.shortfall() > 0 {
            warn!(
                bytes_to_free,
                bytes_freed = report.bytes_freed,
                "Cache still over budget after pruning every candidate"
            );
        } else {
            info!(
                files = report.deleted.len(),
                bytes_freed = report.bytes_freed,
                "Cache pruned"
            );
        }

        Ok(report)
    }

    /// Delete every visible cached file.
    ///
    /// All-or-nothing at the listing level: the first failure aborts and is
    /// returned as [`PlaybackError::CachePruneFailed`].
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let paths = self
            .fs
            .list_directory(&self.root)
            .await
            .map_err(|e| PlaybackError::CachePruneFailed(e.to_string()))?;

        let mut removed = 0usize;
        for path in paths.iter().filter(|p| !is_hidden(p)) {
            self.fs
                .delete_file(path)
                .await
                .map_err(|e| PlaybackError::CachePruneFailed(e.to_string()))?;
            removed += 1;
        }

        info!("Cleared {} cached files", removed);
        Ok(())
    }

    /// Free bytes on the cache volume, or `None` when the query fails.
    pub async fn available_space(&self) -> Option<u64> {
        match self.fs.available_space(&self.root).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Free space query failed for {:?}: {}", self.root, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for CacheDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDirectory")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

/// Last path segment of `url`, ignoring scheme, host, query and fragment.
fn file_name_for_url(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next()?;
    let without_query = without_fragment.split('?').next()?;

    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path)?,
        None => without_query,
    };

    let name = path.rsplit('/').next()?;
    if name.is_empty() || name.starts_with('.') || name.contains('\\') {
        return None;
    }
    Some(name)
}
