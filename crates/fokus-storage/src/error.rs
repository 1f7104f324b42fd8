//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to open the storage backend at the given path.
    #[error("failed to open storage at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to write a value to storage.
    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Failed to delete a key from storage.
    #[error("failed to delete key '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// The write would exceed the backend's capacity.
    #[error("quota exceeded writing key '{key}': {used} of {quota} bytes in use, {requested} requested")]
    QuotaExceeded {
        key: String,
        used: usize,
        requested: usize,
        quota: usize,
    },

    /// The on-disk document could not be encoded or decoded.
    #[error("storage document is corrupt: {reason}")]
    Serialization { reason: String },
}
