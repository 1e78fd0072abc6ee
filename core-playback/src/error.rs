//! # Playback Error Types
//!
//! Error taxonomy surfaced by the cache, the download manager and the spin
//! players. Callers branch on these kinds; the messages are for logs.

use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in cache, download and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// The cache folder could not be created.
    #[error("Failed to create cache directory {path:?}: {message}")]
    DirectoryCreationFailed { path: PathBuf, message: String },

    /// A finished download could not be moved into the cache.
    #[error("Failed to move downloaded file into {path:?}: {message}")]
    FileMoveFailed { path: PathBuf, message: String },

    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    /// The remote URL has no usable last path segment.
    #[error("Invalid remote URL: {0}")]
    InvalidRemoteUrl(String),

    /// Clearing the cache failed; carries the underlying message.
    #[error("Cache prune failed: {0}")]
    CachePruneFailed(String),

    /// Free space on the cache volume is below the download threshold.
    #[error("Insufficient storage: {available} bytes available, {required} required")]
    InsufficientStorage { available: u64, required: u64 },

    // ========================================================================
    // Download Errors
    // ========================================================================
    /// Transport failure. Candidate for retry.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Cancelled by the caller. Never retried.
    #[error("Download cancelled")]
    DownloadCancelled,

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    // ========================================================================
    // Player Errors
    // ========================================================================
    /// The spin carries no audio block to play.
    #[error("Spin {0} has no audio block")]
    NoAudioBlock(i64),

    /// The audio engine rejected an operation.
    #[error("Audio engine error: {0}")]
    EngineError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PlaybackError {
    /// Returns `true` if the error stems from a user-initiated cancellation.
    ///
    /// Cancellations must never be retried.
    pub fn is_cancellation(&self) -> bool {
        match self {
            PlaybackError::DownloadCancelled => true,
            PlaybackError::Bridge(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::DownloadFailed(_))
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::UnsupportedCodec(_)
                | PlaybackError::DecodingError(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
