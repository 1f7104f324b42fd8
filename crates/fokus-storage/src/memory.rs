//! In-memory storage backend.
//!
//! Stores all data in a `BTreeMap` behind a `RwLock`. Not persistent: all
//! data is lost when the process exits. An optional byte quota reproduces the
//! capacity limit of browser local storage so callers can exercise their
//! quota-exceeded paths in tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError, entry_size};

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<String, String>,
    used: usize,
}

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Clones share the same underlying map.
///
/// # Examples
///
/// ```
/// # use fokus_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("fokus_user", "{}").await.unwrap();
/// let val = backend.get("fokus_user").await.unwrap();
/// assert_eq!(val.as_deref(), Some("{}"));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<RwLock<Inner>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Create a new empty backend with no capacity limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            quota: None,
        }
    }

    /// Create a new empty backend that rejects writes past `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            quota: Some(quota),
        }
    }

    /// Bytes currently stored (keys plus values).
    pub async fn used_bytes(&self) -> usize {
        self.inner.read().await.used
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let previous = inner.data.get(key).map_or(0, |old| entry_size(key, old));
        let requested = entry_size(key, value);
        let after = inner.used.saturating_sub(previous).saturating_add(requested);

        if let Some(quota) = self.quota {
            if after > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    used: inner.used,
                    requested,
                    quota,
                });
            }
        }

        inner.data.insert(key.to_owned(), value.to_owned());
        inner.used = after;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(old) = inner.data.remove(key) {
            inner.used = inner.used.saturating_sub(entry_size(key, &old));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.read().await;
        let keys = inner
            .data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.data.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let backend = MemoryBackend::new();
        let result = backend.get("does_not_exist").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let backend = MemoryBackend::new();
        backend.put("key", "v1").await.unwrap();
        backend.put("key", "v2").await.unwrap();
        let val = backend.get("key").await.unwrap();
        assert_eq!(val.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn delete_nonexistent_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let backend = MemoryBackend::new();
        backend.put("fokus_user", "1").await.unwrap();
        backend.put("fokus_errors", "2").await.unwrap();
        backend.put("theme", "3").await.unwrap();

        let keys = backend.list("fokus_").await.unwrap();
        assert_eq!(keys, vec!["fokus_errors", "fokus_user"]);
    }

    #[tokio::test]
    async fn quota_rejects_oversized_write() {
        let backend = MemoryBackend::with_quota(16);
        backend.put("a", "0123456789").await.unwrap();

        let err = backend.put("b", "0123456789").await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 16, .. }));
        assert!(!backend.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn quota_counts_overwrites_once() {
        let backend = MemoryBackend::with_quota(12);
        backend.put("a", "0123456789").await.unwrap();
        backend.put("a", "9876543210").await.unwrap();
        assert_eq!(backend.used_bytes().await, 11);
    }

    #[tokio::test]
    async fn delete_releases_quota() {
        let backend = MemoryBackend::with_quota(12);
        backend.put("a", "0123456789").await.unwrap();
        backend.delete("a").await.unwrap();
        backend.put("b", "0123456789").await.unwrap();
        assert_eq!(backend.used_bytes().await, 11);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("key", "val").await.unwrap();
        let val = clone.get("key").await.unwrap();
        assert_eq!(val.as_deref(), Some("val"));
    }
}
