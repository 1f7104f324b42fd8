//! JSON-file storage backend, the persistent default.
//!
//! The whole store is a single JSON object (`{"key": "value", ...}`) kept in
//! memory and rewritten on every mutation. Writes go to a sibling temp file
//! first and are renamed over the original, so a crash mid-write leaves the
//! previous document intact.
//!
//! Stores of this kind hold a handful of small entries (a session record, an
//! error log), so rewriting the full document is cheaper than it sounds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::{DEFAULT_QUOTA_BYTES, StorageBackend, StorageError, entry_size};

/// A storage backend persisted as one JSON document on disk.
///
/// # Examples
///
/// ```no_run
/// # use fokus_storage::FileBackend;
/// # #[tokio::main]
/// # async fn main() {
/// let backend = FileBackend::open("./fokus-cache.json").await.unwrap();
/// # }
/// ```
pub struct FileBackend {
    path: PathBuf,
    quota: usize,
    data: Mutex<BTreeMap<String, String>>,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Open the store at `path` with the default quota.
    ///
    /// A missing file is treated as an empty store and created on first write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the file exists but cannot be read,
    /// or [`StorageError::Serialization`] if it is not a JSON string map.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_quota(path, DEFAULT_QUOTA_BYTES).await
    }

    /// Open the store at `path`, rejecting writes past `quota` bytes.
    ///
    /// # Errors
    ///
    /// Same as [`FileBackend::open`].
    pub async fn open_with_quota(
        path: impl AsRef<Path>,
        quota: usize,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Serialization {
                    reason: format!("{}: {e}", path.display()),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StorageError::Open {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        tracing::debug!(path = %path.display(), entries = data.len(), "file storage opened");

        Ok(Self {
            path,
            quota,
            data: Mutex::new(data),
        })
    }

    /// Return the filesystem path of this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &BTreeMap<String, String>, key: &str) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(data).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_owned(),
            reason: format!("{}: {e}", self.path.display()),
        };

        tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let data = self.data.lock().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;

        let used: usize = data.iter().map(|(k, v)| entry_size(k, v)).sum();
        let previous = data.get(key).map_or(0, |old| entry_size(key, old));
        let requested = entry_size(key, value);
        if used.saturating_sub(previous).saturating_add(requested) > self.quota {
            return Err(StorageError::QuotaExceeded {
                key: key.to_owned(),
                used,
                requested,
                quota: self.quota,
            });
        }

        let old = data.insert(key.to_owned(), value.to_owned());
        if let Err(e) = self.persist(&data, key).await {
            // Keep memory consistent with what is on disk.
            match old {
                Some(old) => data.insert(key.to_owned(), old),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;
        let Some(old) = data.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&data, key).await {
            data.insert(key.to_owned(), old);
            return Err(StorageError::Delete {
                key: key.to_owned(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.lock().await;
        Ok(data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
