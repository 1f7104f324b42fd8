//! JSON cache over a storage backend.
//!
//! Every value passes through `serde_json` on its way in and out. The cache
//! never fails loudly: a missing key, an unreadable backend, or a value that
//! no longer deserializes all read as `None`, and a rejected write (quota
//! exceeded, disk error) reads as `false`. Failures are logged at `warn`.

use std::sync::Arc;

use fokus_storage::StorageBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// A failure-tolerant JSON cache.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct KvCache {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for KvCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCache").finish_non_exhaustive()
    }
}

impl KvCache {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Read and deserialize `key`. `None` on a miss or on any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached value is not valid JSON for the requested type");
                None
            }
        }
    }

    /// Serialize and store `value` under `key`. Returns whether it was stored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache value could not be serialized");
                return false;
            }
        };

        match self.storage.put(key, &raw).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Delete `key`. Returns whether the backend accepted the delete;
    /// removing a missing key counts as success.
    pub async fn remove(&self, key: &str) -> bool {
        match self.storage.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Keys starting with `prefix`. Empty on failure.
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.storage.list(prefix).await.unwrap_or_else(|e| {
            warn!(prefix, error = %e, "cache listing failed");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fokus_storage::MemoryBackend;
    use serde::Deserialize;
    use serde_json::{Value, json};

    fn cache() -> (KvCache, MemoryBackend) {
        let backend = MemoryBackend::new();
        (KvCache::new(Arc::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn set_then_get_returns_equal_value() {
        let (cache, _) = cache();
        let values = [
            json!(null),
            json!(42),
            json!("text with \"quotes\""),
            json!([1, "two", {"three": 3}]),
            json!({"id": "u1", "email": "a@b.c", "confirmed": true, "nested": {"x": [1.5]}}),
        ];
        for value in values {
            assert!(cache.set("k", &value).await);
            assert_eq!(cache.get::<Value>("k").await, Some(value));
        }
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let (cache, _) = cache();
        assert_eq!(cache.get::<Value>("absent").await, None);
    }

    #[tokio::test]
    async fn remove_then_get_is_none() {
        let (cache, _) = cache();
        assert!(cache.set("k", &json!({"a": 1})).await);
        assert!(cache.remove("k").await);
        assert_eq!(cache.get::<Value>("k").await, None);
        assert!(cache.remove("k").await);
    }

    #[tokio::test]
    async fn unparsable_value_reads_as_none() {
        let (cache, backend) = cache();
        backend.put("k", "{not json").await.unwrap();
        assert_eq!(cache.get::<Value>("k").await, None);
    }

    #[tokio::test]
    async fn wrong_shape_reads_as_none() {
        #[derive(Debug, Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            confirmed: bool,
        }

        let (cache, _) = cache();
        assert!(cache.set("k", &json!({"confirmed": "yes"})).await);
        assert!(cache.get::<Shape>("k").await.is_none());
    }

    #[tokio::test]
    async fn quota_exceeded_reports_false() {
        let cache = KvCache::new(Arc::new(MemoryBackend::with_quota(8)));
        assert!(!cache.set("key", &"a value that does not fit").await);
        assert_eq!(cache.get::<String>("key").await, None);
    }
}
