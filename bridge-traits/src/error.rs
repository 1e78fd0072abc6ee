use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the operation was aborted rather than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
            || matches!(self, BridgeError::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
