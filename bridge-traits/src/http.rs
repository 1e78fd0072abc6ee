//! HTTP Download Abstraction
//!
//! Provides resumable single-file HTTP(S) GET downloads into a local file.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Progress callback: `(written_bytes, expected_total_bytes)`.
///
/// The total is `None` when the server did not report a content length.
pub type ProgressCallback = dyn Fn(u64, Option<u64>) + Send + Sync;

/// Download request builder
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// File the body is written to. An existing partial file is resumed.
    pub destination: PathBuf,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Result of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Total bytes now present in the destination file
    pub bytes_written: u64,
    /// Content length reported by the server for the whole resource
    pub total_bytes: Option<u64>,
    /// Whether the transfer continued an existing partial file
    pub resumed: bool,
}

/// Async HTTP client trait
///
/// Implementations should handle:
/// - Resuming a partial destination file with a `Range` request
/// - Falling back to a full transfer when the server ignores the range
/// - TLS certificate validation
///
/// Cancellation is cooperative: callers drop the future (or abort the task
/// running it) and implementations must leave the partial file in place.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{DownloadRequest, HttpClient};
///
/// async fn fetch(client: &dyn HttpClient) -> Result<()> {
///     let request = DownloadRequest::new("https://cdn.example.com/a.m4a", "/tmp/a.m4a.part");
///     client.download_to_file(request, &|written, total| {
///         println!("{written}/{total:?}");
///     }).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Download `request.url` into `request.destination`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - The server answers with a non-success status
    /// - The destination cannot be written
    async fn download_to_file(
        &self,
        request: DownloadRequest,
        progress: &ProgressCallback,
    ) -> Result<DownloadOutcome>;
}
