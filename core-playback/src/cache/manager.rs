//! # Download Manager
//!
//! Orchestrates per-URL downloads into the [`CacheDirectory`].
//!
//! - Cached URLs complete immediately without any network activity
//! - New downloads are refused while free space is below the configured floor
//! - Every in-flight [`FileDownloader`] lives in one table keyed by
//!   [`DownloadId`]; entries leave the table on completion, failure or cancel
//! - After each successful download the cache is pruned back to its ceiling,
//!   sparing the file just downloaded
//!
//! The table sits behind a single mutex, so the manager can be shared across
//! threads behind an `Arc` and called concurrently.

use crate::cache::directory::{CacheDirectory, PruneReport};
use crate::cache::downloader::{CompletionHandler, FileDownloader, ProgressHandler};
use crate::error::{PlaybackError, Result};
use bridge_traits::http::HttpClient;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Opaque handle to a download started by [`DownloadManager::download_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(Uuid);

impl DownloadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DownloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type DownloadTable = Arc<Mutex<HashMap<DownloadId, Arc<FileDownloader>>>>;

/// Process-wide download manager.
pub struct DownloadManager {
    directory: Arc<CacheDirectory>,
    http: Arc<dyn HttpClient>,
    downloads: DownloadTable,
    event_bus: Option<Arc<EventBus>>,
}

impl DownloadManager {
    pub fn new(directory: Arc<CacheDirectory>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            directory,
            http,
            downloads: Arc::new(Mutex::new(HashMap::new())),
            event_bus: None,
        }
    }

    /// Set event bus for download events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn directory(&self) -> &Arc<CacheDirectory> {
        &self.directory
    }

    /// Start downloading `remote_url` into the cache.
    ///
    /// `on_complete` receives the local path, or the error that ended the
    /// download. For a URL that is already cached it runs before this method
    /// returns and the returned id refers to no work.
    ///
    /// # Errors
    ///
    /// Refusals happen before anything is registered and are returned
    /// directly; `on_complete` is not called for them:
    ///
    /// - [`PlaybackError::InvalidRemoteUrl`] when the URL has no file name
    /// - [`PlaybackError::InsufficientStorage`] when known free space is below
    ///   the configured minimum
    /// - [`PlaybackError::DirectoryCreationFailed`] when the download folder
    ///   cannot be created
    #[instrument(skip(self, remote_url, on_progress, on_complete), fields(url = %redact_url(remote_url)))]
    pub async fn download_file(
        &self,
        remote_url: &str,
        on_progress: Option<ProgressHandler>,
        on_complete: CompletionHandler,
    ) -> Result<DownloadId> {
        let local_path = self.directory.local_path(remote_url)?;
        let fs = self.directory.file_system();

        let cached = fs.exists(&local_path).await.unwrap_or_else(|e| {
            warn!("Existence check failed for {:?}: {}", local_path, e);
            false
        });
        if cached {
            let id = DownloadId::new();
            debug!("Serving {} from cache", redact_url(remote_url));
            self.emit(DownloadEvent::Completed {
                download_id: id.to_string(),
                url: remote_url.to_string(),
                local_path: local_path.clone(),
            });
            on_complete(Ok(local_path));
            return Ok(id);
        }

        let required = self.directory.config().min_free_space_bytes;
        if let Some(available) = self.directory.available_space().await {
            if available < required {
                warn!(available, required, "Refusing download, disk nearly full");
                return Err(PlaybackError::InsufficientStorage {
                    available,
                    required,
                });
            }
        }

        let partial = self.directory.partial_directory();
        fs.create_dir_all(&partial)
            .await
            .map_err(|e| PlaybackError::DirectoryCreationFailed {
                path: partial.clone(),
                message: e.to_string(),
            })?;

        let id = DownloadId::new();
        let completion = self.completion_handler(id, remote_url, on_complete);
        let progress = self.progress_handler(id, on_progress);

        {
            let mut downloads = self.downloads.lock();
            let temp_path = temp_path_for(&partial, &local_path, id, &downloads);
            let downloader = FileDownloader::start(
                remote_url,
                local_path,
                temp_path,
                Arc::clone(&self.http),
                fs,
                progress,
                completion,
            );
            downloads.insert(id, downloader);
        }

        info!(%id, "Download started");
        self.emit(DownloadEvent::Started {
            download_id: id.to_string(),
            url: remote_url.to_string(),
        });
        Ok(id)
    }

    /// Download `remote_url` and wait for the local path.
    ///
    /// # Errors
    ///
    /// Everything [`download_file`](Self::download_file) refuses with, plus the
    /// terminal error of the transfer itself.
    pub async fn download(&self, remote_url: &str) -> Result<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.download_file(
            remote_url,
            None,
            Box::new(move |result| {
                tx.send(result).ok();
            }),
        )
        .await?;

        rx.await
            .map_err(|_| PlaybackError::Unknown("Download ended without a result".to_string()))?
    }

    /// Cancel one download. Returns `false` for unknown or finished ids.
    pub fn cancel(&self, id: DownloadId) -> bool {
        let downloader = self.downloads.lock().remove(&id);
        match downloader {
            Some(downloader) => {
                downloader.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every download whose remote URL or cache path matches `url`.
    ///
    /// Returns the number of downloads cancelled.
    pub fn cancel_all_for_url(&self, url: &str) -> usize {
        let mapped = self.directory.local_path(url).ok();
        let matching: Vec<Arc<FileDownloader>> = {
            let mut downloads = self.downloads.lock();
            let ids: Vec<DownloadId> = downloads
                .iter()
                .filter(|(_, d)| {
                    d.remote_url() == url
                        || d.local_path() == Path::new(url)
                        || mapped.as_deref() == Some(d.local_path())
                })
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| downloads.remove(id)).collect()
        };

        for downloader in &matching {
            downloader.cancel();
        }
        matching.len()
    }

    /// Cancel every active download. Returns the number cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Arc<FileDownloader>> =
            self.downloads.lock().drain().map(|(_, d)| d).collect();
        for downloader in &drained {
            downloader.cancel();
        }
        if !drained.is_empty() {
            info!("Cancelled {} downloads", drained.len());
        }
        drained.len()
    }

    /// Progress of an active download.
    pub fn progress(&self, id: DownloadId) -> Option<f64> {
        self.downloads.lock().get(&id).map(|d| d.progress())
    }

    pub fn active_download_count(&self) -> usize {
        self.downloads.lock().len()
    }

    // ========================================================================
    // Cache passthroughs
    // ========================================================================

    pub async fn exists(&self, remote_url: &str) -> Result<bool> {
        self.directory.exists(remote_url).await
    }

    pub fn local_path(&self, remote_url: &str) -> Result<PathBuf> {
        self.directory.local_path(remote_url)
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.directory.clear().await
    }

    /// Prune to `max_size_bytes`, or the configured ceiling when `None`.
    pub async fn prune_cache(
        &self,
        max_size_bytes: Option<u64>,
        exclude: &[PathBuf],
    ) -> Result<PruneReport> {
        let max = max_size_bytes.unwrap_or(self.directory.config().max_cache_size_bytes);
        self.directory.prune(max, exclude).await
    }

    pub async fn current_cache_size(&self) -> u64 {
        self.directory.current_size().await
    }

    pub async fn available_disk_space(&self) -> Option<u64> {
        self.directory.available_space().await
    }

    // ========================================================================
    // Callback plumbing
    // ========================================================================

    fn progress_handler(
        &self,
        id: DownloadId,
        on_progress: Option<ProgressHandler>,
    ) -> Option<ProgressHandler> {
        let Some(event_bus) = self.event_bus.clone() else {
            return on_progress;
        };
        Some(Arc::new(move |progress: f64| {
            event_bus
                .emit(CoreEvent::Download(DownloadEvent::Progress {
                    download_id: id.to_string(),
                    progress,
                }))
                .ok();
            if let Some(handler) = &on_progress {
                handler(progress);
            }
        }))
    }

    /// Wrap the caller's completion: leave the table, publish, prune on
    /// success, then forward.
    fn completion_handler(
        &self,
        id: DownloadId,
        remote_url: &str,
        on_complete: CompletionHandler,
    ) -> CompletionHandler {
        let downloads = Arc::clone(&self.downloads);
        let directory = Arc::clone(&self.directory);
        let event_bus = self.event_bus.clone();
        let url = remote_url.to_string();

        Box::new(move |result: Result<PathBuf>| {
            downloads.lock().remove(&id);

            let event = match &result {
                Ok(path) => DownloadEvent::Completed {
                    download_id: id.to_string(),
                    url: url.clone(),
                    local_path: path.clone(),
                },
                Err(e) if e.is_cancellation() => DownloadEvent::Cancelled {
                    download_id: id.to_string(),
                    url: url.clone(),
                },
                Err(e) => DownloadEvent::Failed {
                    download_id: id.to_string(),
                    url: url.clone(),
                    message: e.to_string(),
                },
            };
            if let Some(bus) = &event_bus {
                bus.emit(CoreEvent::Download(event)).ok();
            }

            let path = match result {
                Ok(path) => path,
                Err(e) => return on_complete(Err(e)),
            };

            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let max = directory.config().max_cache_size_bytes;
                        if let Err(e) = directory.prune(max, std::slice::from_ref(&path)).await {
                            warn!("Post-download prune failed: {}", e);
                        }
                        on_complete(Ok(path));
                    });
                }
                Err(_) => on_complete(Ok(path)),
            }
        })
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }
}

impl fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadManager")
            .field("directory", &self.directory)
            .field("active_downloads", &self.active_download_count())
            .finish()
    }
}

/// Temp file for a new download. Resumable across runs unless another active
/// download already writes the same name.
fn temp_path_for(
    partial: &Path,
    local_path: &Path,
    id: DownloadId,
    active: &HashMap<DownloadId, Arc<FileDownloader>>,
) -> PathBuf {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string());

    let shared = partial.join(format!("{}.part", name));
    if active.values().any(|d| d.temp_path() == shared) {
        partial.join(format!("{}.{}.part", name, id))
    } else {
        shared
    }
}
