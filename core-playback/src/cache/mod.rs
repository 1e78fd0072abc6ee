//! # Audio File Cache Module
//!
//! Downloads audio assets and keeps them on local storage under a size ceiling.
//!
//! ## Overview
//!
//! - Files are stored under `<documents>/AudioFiles`, named by the last path
//!   segment of their remote URL
//! - Size and modification time on disk are the only metadata; there is no
//!   database or manifest
//! - Pruning deletes the oldest-modified files first until the cache fits
//! - Downloads resume from a hidden `.partial` folder
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadManager                    │
//! │  - download_file() / download()        │
//! │  - cancel() / cancel_all()             │
//! │  - prune_cache() / clear_cache()       │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CacheDirectory (FileSystemAccess)
//!          └──> FileDownloader × N (HttpClient)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheDirectory, DownloadManager};
//! use std::sync::Arc;
//!
//! # async fn example(fs: Arc<dyn bridge_traits::FileSystemAccess>,
//! #                  http: Arc<dyn bridge_traits::HttpClient>) -> core_playback::Result<()> {
//! let documents = fs.get_documents_directory().await?;
//! let directory = Arc::new(CacheDirectory::new(fs, documents, CacheConfig::default()));
//! directory.initialize().await?;
//!
//! let manager = DownloadManager::new(directory, http);
//! let path = manager.download("https://cdn.example.com/audio/42.m4a").await?;
//! println!("Cached at {:?}", path);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod downloader;
pub mod manager;

// Re-export commonly used types
pub use config::{CacheConfig, MIB};
pub use directory::{CacheDirectory, CacheEntry, PruneReport, PARTIAL_DIRECTORY};
pub use downloader::{
    CompletionHandler, DownloadState, FileDownloader, ProgressHandler,
};
pub use manager::{DownloadId, DownloadManager};
