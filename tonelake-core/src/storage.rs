//! Storage trait interfaces and built-in backends.
//!
//! The pipeline talks to bulk object storage only through `StorageRead` and
//! `StorageWrite`. Keys are plain `/`-separated paths relative to a storage
//! root; backends decide how those map to the underlying store.
//!
//! Two implementations live here:
//! - `MemoryStorage`: interior-mutability HashMap, the test backend
//! - `FileStorage`: local filesystem rooted at a base directory
//!
//! The S3 backend lives in `tonelake-storage-aws` and implements the same
//! traits.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};

/// Read access to a keyed object store.
#[async_trait]
pub trait StorageRead: Debug + Send + Sync {
    /// Read an entire object.
    async fn read_bytes(&self, key: &str) -> Result<Bytes>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all object keys starting with the given prefix.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Write access to a keyed object store.
#[async_trait]
pub trait StorageWrite: Debug + Send + Sync {
    /// Write an object, overwriting any existing object at the key.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Combined read/write storage handle.
pub trait Storage: StorageRead + StorageWrite {}

impl<T: StorageRead + StorageWrite> Storage for T {}

// ============================================================================
// MemoryStorage
// ============================================================================

/// In-memory storage backend.
///
/// Clones share the underlying map, so a clone handed to the pipeline and the
/// original held by a test observe the same writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<std::collections::HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert data at the given key
    ///
    /// Note: takes `&self` (not `&mut self`) due to interior mutability.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.data
            .write()
            .expect("RwLock poisoned")
            .insert(key.into(), data.into());
    }

    /// Insert a JSON-serialized value at the given key
    pub fn insert_json<T: serde::Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.insert(key, bytes);
        Ok(())
    }
}

#[async_trait]
impl StorageRead for MemoryStorage {
    async fn read_bytes(&self, key: &str) -> Result<Bytes> {
        self.data
            .read()
            .expect("RwLock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.read().expect("RwLock poisoned").contains_key(key))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let data = self.data.read().expect("RwLock poisoned");
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl StorageWrite for MemoryStorage {
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.data
            .write()
            .expect("RwLock poisoned")
            .insert(key.to_string(), Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // Idempotent: ok even if not found
        self.data.write().expect("RwLock poisoned").remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStorage
// ============================================================================

/// File-based storage rooted at a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: std::path::PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base path
    pub fn new(base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get the base path for this storage
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// Resolve a key to a path under the base directory.
    ///
    /// Absolute keys and `..` traversal are rejected.
    fn resolve(&self, key: &str) -> Result<std::path::PathBuf> {
        use std::path::Component;
        let p = std::path::Path::new(key);

        if p.is_absolute()
            || p.components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(Error::storage(format!(
                "Invalid storage key '{}': must be a relative path without '..'",
                key
            )));
        }

        Ok(self.base_path.join(p))
    }
}

#[async_trait]
impl StorageRead for FileStorage {
    async fn read_bytes(&self, key: &str) -> Result<Bytes> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("{}: {}", key, path.display())))
            }
            Err(e) => Err(Error::io(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(format!(
                "Failed to stat {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // The prefix may end mid-filename, so list from the parent directory
        // and re-filter against the full prefix.
        let full_path = self.base_path.join(prefix);
        let list_dir = if full_path.is_dir() {
            full_path
        } else {
            full_path
                .parent()
                .unwrap_or(&self.base_path)
                .to_path_buf()
        };

        if !list_dir.exists() {
            return Ok(Vec::new());
        }

        // Walk directory recursively
        let mut results = Vec::new();
        let mut dirs_to_visit = vec![list_dir];

        while let Some(dir) = dirs_to_visit.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::io(format!("Failed to list {}: {}", dir.display(), e)));
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                Error::io(format!("Failed to read entry in {}: {}", dir.display(), e))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    Error::io(format!(
                        "Failed to get file type for {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                if file_type.is_dir() {
                    dirs_to_visit.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.base_path) {
                        // Normalize to `/` so keys compare identically across platforms
                        let key = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        if key.starts_with(prefix) {
                            results.push(key);
                        }
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }
}

#[async_trait]
impl StorageWrite for FileStorage {
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::io(format!("Failed to write {}: {}", path.display(), e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Idempotent: not found is OK
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        storage
            .insert_json("a/b.json", &serde_json::json!({"x": 1}))
            .unwrap();

        let content = storage.read_bytes("a/b.json").await.unwrap();
        assert_eq!(&content[..], b"{\"x\":1}");
        assert!(storage.exists("a/b.json").await.unwrap());
        assert!(!storage.exists("a/c.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_storage_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read_bytes("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_storage_list_prefix_sorted() {
        let storage = MemoryStorage::new();
        storage.insert("logs/2018/11/b.json", &b"{}"[..]);
        storage.insert("logs/2018/11/a.json", &b"{}"[..]);
        storage.insert("songs/x.json", &b"{}"[..]);

        let keys = storage.list_prefix("logs/").await.unwrap();
        assert_eq!(keys, vec!["logs/2018/11/a.json", "logs/2018/11/b.json"]);
    }

    #[tokio::test]
    async fn test_memory_storage_overwrite_and_delete() {
        let storage = MemoryStorage::new();
        storage.write_bytes("k", b"one").await.unwrap();
        storage.write_bytes("k", b"two").await.unwrap();
        assert_eq!(&storage.read_bytes("k").await.unwrap()[..], b"two");

        storage.delete("k").await.unwrap();
        // Deleting again is fine
        storage.delete("k").await.unwrap();
        assert!(!storage.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_storage_rejects_traversal() {
        let storage = FileStorage::new("/tmp/tonelake-test");
        assert!(storage.read_bytes("../etc/passwd").await.is_err());
        assert!(storage.read_bytes("/etc/passwd").await.is_err());
    }
}
