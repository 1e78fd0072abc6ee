//! Cache configuration and limits

use serde::{Deserialize, Serialize};

/// Bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Configuration for the audio file cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Folder under the documents root that holds cached files (default: "AudioFiles")
    pub cache_directory: String,

    /// Size ceiling the cache is pruned back to (default: 50MiB)
    pub max_cache_size_bytes: u64,

    /// Free space required on the cache volume to start a download (default: 10MiB)
    pub min_free_space_bytes: u64,

    /// Extra bytes freed by each prune on top of the overshoot (default: 1MiB)
    pub prune_buffer_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: "AudioFiles".to_string(),
            max_cache_size_bytes: 50 * MIB,
            min_free_space_bytes: 10 * MIB,
            prune_buffer_bytes: MIB,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache folder name.
    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set the free-space threshold for new downloads.
    pub fn with_min_free_space(mut self, bytes: u64) -> Self {
        self.min_free_space_bytes = bytes;
        self
    }

    /// Set the slack freed beyond the ceiling when pruning.
    pub fn with_prune_buffer(mut self, bytes: u64) -> Self {
        self.prune_buffer_bytes = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.cache_directory.contains(['/', '\\']) || self.cache_directory.starts_with('.') {
            return Err("cache_directory must be a plain, visible folder name".to_string());
        }

        Ok(())
    }
}
