//! Storage backend abstraction for the Fokus site.
//!
//! This crate defines the [`StorageBackend`] trait, a string key-value
//! interface with the same shape as browser local storage. It knows nothing
//! about sessions, routes, or JSON documents; the cache in `fokus-core` wraps
//! a backend and handles (de)serialization on top of it.
//!
//! Two implementations are provided:
//!
//! - [`FileBackend`] — persistent, a single JSON document on disk
//! - [`MemoryBackend`] — in-memory with an optional byte quota, for tests and
//!   development

mod error;
mod file_backend;
mod memory;

pub use error::StorageError;
pub use file_backend::FileBackend;
pub use memory::MemoryBackend;

/// Default quota applied to capacity-limited backends, in bytes.
///
/// Matches the 5 MiB most browsers grant a single origin's local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// A pluggable string key-value storage backend.
///
/// Keys are short identifiers such as `fokus_user`. Values are opaque
/// strings, in practice JSON documents produced by the cache layer.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the write would push the
    /// backend past its capacity, or [`StorageError::Write`] if the
    /// underlying backend fails.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting a non-existent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys that start with the given prefix, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Check whether a key exists in storage.
    ///
    /// The default implementation calls [`get`](StorageBackend::get) and checks
    /// for `Some`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](StorageBackend::get).
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Bytes a key-value pair occupies against a quota.
///
/// Browsers count UTF-16 code units for both key and value; counting UTF-8
/// bytes is close enough for the quota check and never undercounts ASCII.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len().saturating_add(value.len())
}
