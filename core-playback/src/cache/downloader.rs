//! # File Downloader
//!
//! Single-download state machine.
//!
//! ```text
//! Created ──start──► Downloading ──┬──► Completed
//!                                  ├──► Failed
//!                                  └──► Cancelled
//! ```
//!
//! A downloader fetches one remote URL into a temporary file, then moves it
//! to its cache path. Exactly one terminal callback fires per instance:
//! the completion with the local path, a failure, or
//! [`PlaybackError::DownloadCancelled`]. After a terminal state no callback
//! is ever invoked again.

use crate::error::{PlaybackError, Result};
use bridge_traits::http::{DownloadRequest, HttpClient};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::logging::{redact_url, strip_path};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Receives download progress in `[0.0, 1.0]`.
pub type ProgressHandler = Arc<dyn Fn(f64) + Send + Sync>;

/// Receives the terminal result of a download.
pub type CompletionHandler = Box<dyn FnOnce(Result<PathBuf>) + Send>;

/// Lifecycle of a [`FileDownloader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Created,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

struct DownloaderInner {
    state: DownloadState,
    progress: f64,
    moving: bool,
    on_progress: Option<ProgressHandler>,
    on_complete: Option<CompletionHandler>,
}

/// One in-flight transfer of a remote file into the cache.
pub struct FileDownloader {
    remote_url: String,
    local_path: PathBuf,
    temp_path: PathBuf,
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    inner: Mutex<DownloaderInner>,
    cancel_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FileDownloader {
    /// Create a downloader and start the transfer on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        remote_url: impl Into<String>,
        local_path: PathBuf,
        temp_path: PathBuf,
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        on_progress: Option<ProgressHandler>,
        on_complete: CompletionHandler,
    ) -> Arc<Self> {
        let downloader = Arc::new(Self {
            remote_url: remote_url.into(),
            local_path,
            temp_path,
            http,
            fs,
            inner: Mutex::new(DownloaderInner {
                state: DownloadState::Created,
                progress: 0.0,
                moving: false,
                on_progress,
                on_complete: Some(on_complete),
            }),
            cancel_token: CancellationToken::new(),
            task: Mutex::new(None),
        });

        downloader.inner.lock().state = DownloadState::Downloading;
        let runner = Arc::clone(&downloader);
        let handle = tokio::spawn(async move { runner.run().await });
        *downloader.task.lock() = Some(handle);

        downloader
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn state(&self) -> DownloadState {
        self.inner.lock().state
    }

    /// Fraction of the file received so far.
    pub fn progress(&self) -> f64 {
        self.inner.lock().progress
    }

    /// Cancel the transfer.
    ///
    /// Fires the cancellation error synchronously, then drops every callback.
    /// Returns `false` when the download had already finished.
    pub fn cancel(&self) -> bool {
        let (completion, moving) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return false;
            }
            inner.state = DownloadState::Cancelled;
            inner.on_progress = None;
            (inner.on_complete.take(), inner.moving)
        };

        self.cancel_token.cancel();
        let task = self.task.lock().take();
        match task {
            // A rename in flight is left to land; the transfer task removes
            // the moved file once it sees the cancellation.
            Some(_) if moving => {}
            Some(task) => task.abort(),
            None => {}
        }

        info!(url = %redact_url(&self.remote_url), "Download cancelled");
        if let Some(completion) = completion {
            completion(Err(PlaybackError::DownloadCancelled));
        }
        true
    }

    #[instrument(skip(self), fields(url = %redact_url(&self.remote_url)))]
    async fn run(self: Arc<Self>) {
        debug!("Starting transfer into {:?}", self.temp_path);

        let request = DownloadRequest::new(self.remote_url.clone(), self.temp_path.clone());
        let reporter = Arc::clone(&self);
        let progress = move |written: u64, total: Option<u64>| {
            reporter.report_progress(fraction(written, total));
        };

        let transfer = tokio::select! {
            _ = self.cancel_token.cancelled() => return,
            result = self.http.download_to_file(request, &progress) => result,
        };

        let outcome = match transfer {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() && self.cancel_token.is_cancelled() => {
                self.finish(DownloadState::Cancelled, Err(PlaybackError::DownloadCancelled));
                return;
            }
            Err(e) => {
                warn!("Download failed: {}", e);
                self.finish(
                    DownloadState::Failed,
                    Err(PlaybackError::DownloadFailed(e.to_string())),
                );
                return;
            }
        };

        if self.cancel_token.is_cancelled() {
            return;
        }
        debug!(
            bytes = outcome.bytes_written,
            resumed = outcome.resumed,
            "Transfer finished"
        );

        let placed = self.place_file().await;
        if self.cancel_token.is_cancelled() {
            if let Ok(true) = placed {
                self.discard_moved_file().await;
            }
            return;
        }
        match placed {
            Ok(_) => self.finish(DownloadState::Completed, Ok(self.local_path.clone())),
            Err(e) => {
                warn!("Failed to place downloaded file: {}", e);
                self.finish(DownloadState::Failed, Err(e));
            }
        }
    }

    /// Move the finished temp file to its cache path. `Ok(false)` when
    /// another download already put the file there.
    async fn place_file(&self) -> Result<bool> {
        if self.fs.exists(&self.local_path).await.unwrap_or(false) {
            debug!("Destination {:?} already present, keeping it", self.local_path);
            if let Err(e) = self.fs.delete_file(&self.temp_path).await {
                debug!("Could not remove temp file {:?}: {}", self.temp_path, e);
            }
            return Ok(false);
        }

        if let Some(parent) = self.local_path.parent() {
            self.fs.create_dir_all(parent).await.map_err(|e| {
                PlaybackError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
        }

        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(PlaybackError::DownloadCancelled);
            }
            inner.moving = true;
        }

        self.fs
            .move_file(&self.temp_path, &self.local_path)
            .await
            .map(|_| true)
            .map_err(|e| PlaybackError::FileMoveFailed {
                path: self.local_path.clone(),
                message: e.to_string(),
            })
    }

    /// Best-effort removal of a file moved into place after a cancel.
    async fn discard_moved_file(&self) {
        match self.fs.delete_file(&self.local_path).await {
            Ok(()) => debug!("Removed {:?} moved in after cancellation", self.local_path),
            Err(e) => debug!("Could not remove {:?} after cancellation: {}", self.local_path, e),
        }
    }

    fn report_progress(&self, progress: f64) {
        let handler = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.progress = progress;
            inner.on_progress.clone()
        };
        if let Some(handler) = handler {
            handler(progress);
        }
    }

    /// Enter a terminal state and fire the completion, at most once.
    fn finish(&self, state: DownloadState, result: Result<PathBuf>) {
        let (completion, progress) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = state;
            inner.moving = false;
            if state == DownloadState::Completed {
                inner.progress = 1.0;
            }
            (inner.on_complete.take(), inner.on_progress.take())
        };

        if state == DownloadState::Completed {
            info!(
                url = %redact_url(&self.remote_url),
                file = %strip_path(&self.local_path.to_string_lossy()),
                "Download completed"
            );
            if let Some(progress) = progress {
                progress(1.0);
            }
        }
        if let Some(completion) = completion {
            completion(result);
        }
    }
}

impl std::fmt::Debug for FileDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownloader")
            .field("remote_url", &self.remote_url)
            .field("local_path", &self.local_path)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

/// `written / total`, or zero when the total is unknown or not positive.
fn fraction(written: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (written as f64 / total as f64).min(1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(50, Some(100)), 0.5);
        assert_eq!(fraction(50, None), 0.0);
        assert_eq!(fraction(50, Some(0)), 0.0);
        assert_eq!(fraction(150, Some(100)), 1.0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DownloadState::Created.is_terminal());
        assert!(!DownloadState::Downloading.is_terminal());
        assert!(DownloadState::Completed.is_terminal());
        assert!(DownloadState::Failed.is_terminal());
        assert!(DownloadState::Cancelled.is_terminal());
    }
}
