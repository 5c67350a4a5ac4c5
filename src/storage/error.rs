//! Storage-specific error types.
//!
//! All log file operations return [`StorageError`] on failure. Callers in the
//! web layer treat every variant as fatal to the current request.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or appending the log file failed.
    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer lock was poisoned by a panicking appender.
    #[error("log writer lock poisoned")]
    LockPoisoned,

    /// Internal error (e.g., blocking task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}
