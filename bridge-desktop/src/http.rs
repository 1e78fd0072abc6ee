//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadOutcome, DownloadRequest, HttpClient, ProgressCallback},
};
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides downloads with:
/// - Connection pooling via reqwest
/// - Resume of partial files through `Range` requests
/// - TLS support by default
/// - Streaming writes, so whole files never sit in memory
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_client(Self::default_builder().build().unwrap_or_default())
    }

    /// Create a new HTTP client with a custom connect timeout
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Self::default_builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn default_builder() -> reqwest::ClientBuilder {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("spin-player/", env!("CARGO_PKG_VERSION")))
    }

    fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn download_to_file(
        &self,
        request: DownloadRequest,
        progress: &ProgressCallback,
    ) -> Result<DownloadOutcome> {
        let existing = match fs::metadata(&request.destination).await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            _ => 0,
        };

        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut builder = self.client.get(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if existing > 0 {
            debug!(url = %request.url, offset = existing, "Resuming partial download");
            builder = builder.header(header::RANGE, format!("bytes={}-", existing));
        }

        let response = builder.send().await.map_err(Self::map_reqwest_error)?;
        let status = response.status();

        if existing > 0 && status == StatusCode::RANGE_NOT_SATISFIABLE {
            // The partial file already holds the whole resource.
            info!(url = %request.url, bytes = existing, "Partial download already complete");
            progress(existing, Some(existing));
            return Ok(DownloadOutcome {
                bytes_written: existing,
                total_bytes: Some(existing),
                resumed: true,
            });
        }

        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                url: request.url,
            });
        }

        let resumed = existing > 0 && status == StatusCode::PARTIAL_CONTENT;
        if existing > 0 && !resumed {
            warn!(url = %request.url, "Server ignored range request, restarting download");
        }

        let mut written = if resumed { existing } else { 0 };
        let total_bytes = response.content_length().map(|len| len + written);

        let mut file = if resumed {
            fs::OpenOptions::new()
                .append(true)
                .open(&request.destination)
                .await?
        } else {
            fs::File::create(&request.destination).await?
        };

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Self::map_reqwest_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(written, total_bytes);
        }
        file.flush().await?;

        debug!(url = %request.url, bytes = written, resumed, "Download finished");
        Ok(DownloadOutcome {
            bytes_written: written,
            total_bytes,
            resumed,
        })
    }
}
