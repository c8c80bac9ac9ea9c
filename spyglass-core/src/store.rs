//! JSON document storage with a process-lifetime read-through cache.
//!
//! The store never propagates backend failures to callers: a failed write
//! becomes `false`, a failed or malformed read becomes the caller's
//! default. Every write and cache-population event is recorded for
//! diagnostics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AuditError, Result};

/// Backend selection for a [`DocumentStore`].
#[derive(Debug, Clone)]
pub enum StoreOptions {
    /// Persist documents under a local directory.
    Local {
        /// Root directory for document files.
        root: PathBuf,
    },
    /// Keep documents in memory. Used for tests and offline runs.
    Memory,
}

/// Abstraction over raw document storage for testability.
#[cfg_attr(test, mockall::automock)]
pub trait StorageBackend {
    /// Write serialized content at a logical path.
    fn put(&self, path: &str, content: &str) -> Result<()>;
    /// Read serialized content from a logical path.
    fn get(&self, path: &str) -> Result<String>;
}

/// Storage backend writing documents under a local directory.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl StorageBackend for LocalBackend {
    fn put(&self, path: &str, content: &str) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve(path))?)
    }
}

/// In-memory storage backend. Used for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn put(&self, path: &str, content: &str) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| AuditError::Storage("memory backend poisoned".to_string()))?;
        objects.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<String> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| AuditError::Storage("memory backend poisoned".to_string()))?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| AuditError::MissingDocument(path.to_string()))
    }
}

/// A diagnostic event recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A document was written (or the write failed).
    Saved {
        /// Logical path of the document.
        path: String,
        /// Whether the backend accepted the write.
        ok: bool,
    },
    /// A read was served from the cache.
    CacheHit {
        /// Logical path of the document.
        path: String,
    },
    /// A cache miss populated the cache from the backend.
    CacheFilled {
        /// Logical path of the document.
        path: String,
        /// Whether the backend had content for the path.
        found: bool,
    },
}

/// Key/value persistence for JSON documents with a read-through cache.
///
/// The cache is owned by the store instance, not process-wide; a cached
/// miss (backend had nothing) is cached too, so repeated reads of an
/// absent document do not re-hit the backend.
pub struct DocumentStore {
    backend: Box<dyn StorageBackend + Send + Sync>,
    cache: Mutex<HashMap<String, Option<String>>>,
    events: Mutex<Vec<StoreEvent>>,
}

impl DocumentStore {
    /// Create a store over an explicit backend.
    pub fn new(backend: Box<dyn StorageBackend + Send + Sync>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Create a store from backend options.
    pub fn from_options(options: StoreOptions) -> Self {
        match options {
            StoreOptions::Local { root } => Self::local(root),
            StoreOptions::Memory => Self::in_memory(),
        }
    }

    /// Create a store over the local filesystem.
    pub fn local(root: impl AsRef<Path>) -> Self {
        Self::new(Box::new(LocalBackend::new(root.as_ref())))
    }

    /// Create a store over an in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Serialize a document as JSON and persist it. Returns whether the
    /// write succeeded; the cache entry for `path` is refreshed on success.
    pub fn save<T: Serialize>(&self, path: &str, document: &T) -> bool {
        let content = match serde_json::to_string_pretty(document) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("failed to serialize document for {path}: {err}");
                self.record(StoreEvent::Saved {
                    path: path.to_string(),
                    ok: false,
                });
                return false;
            }
        };
        let ok = match self.backend.put(path, &content) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("failed to write {path}: {err}");
                false
            }
        };
        if ok {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(path.to_string(), Some(content));
            }
        }
        self.record(StoreEvent::Saved {
            path: path.to_string(),
            ok,
        });
        ok
    }

    /// Read a document, consulting the cache first. Absent or malformed
    /// documents yield the caller's default.
    pub fn read<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.read_with(path, default, false)
    }

    /// Read a document, optionally bypassing the cache.
    pub fn read_with<T: DeserializeOwned>(&self, path: &str, default: T, force_refresh: bool) -> T {
        let cached = if force_refresh {
            None
        } else {
            self.cache
                .lock()
                .ok()
                .and_then(|cache| cache.get(path).cloned())
        };

        let content = match cached {
            Some(entry) => {
                self.record(StoreEvent::CacheHit {
                    path: path.to_string(),
                });
                entry
            }
            None => {
                let fetched = match self.backend.get(path) {
                    Ok(content) => Some(content),
                    Err(err) => {
                        log::debug!("no content for {path}: {err}");
                        None
                    }
                };
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(path.to_string(), fetched.clone());
                }
                self.record(StoreEvent::CacheFilled {
                    path: path.to_string(),
                    found: fetched.is_some(),
                });
                fetched
            }
        };

        match content {
            Some(content) => match serde_json::from_str(&content) {
                Ok(document) => document,
                Err(err) => {
                    log::warn!("malformed document at {path}: {err}");
                    default
                }
            },
            None => default,
        }
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Snapshot of recorded diagnostic events.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: StoreEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Save a document a phase cannot proceed without, converting the store's
/// best-effort `false` into an explicit storage error.
pub fn save_required<T: Serialize>(store: &DocumentStore, path: &str, document: &T) -> Result<()> {
    if store.save(path, document) {
        Ok(())
    } else {
        Err(AuditError::Storage(format!("failed to write {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepositoryDataset;
    use std::collections::BTreeMap;

    #[test]
    fn save_then_read_round_trips_with_cold_cache() {
        let store = DocumentStore::in_memory();
        let mut document = BTreeMap::new();
        document.insert("alpha".to_string(), vec!["one".to_string()]);

        assert!(store.save("2024-06-01/data/topics.json", &document));
        store.clear_cache();

        let read: BTreeMap<String, Vec<String>> =
            store.read("2024-06-01/data/topics.json", BTreeMap::new());
        assert_eq!(read, document);
    }

    #[test]
    fn read_consults_cache_before_backend() {
        let store = DocumentStore::in_memory();
        store.save("all/data/history.json", &serde_json::json!({"current": null}));

        let _: serde_json::Value = store.read("all/data/history.json", serde_json::Value::Null);
        let events = store.events();
        assert!(events.contains(&StoreEvent::CacheHit {
            path: "all/data/history.json".to_string()
        }));
    }

    #[test]
    fn absent_document_yields_default_and_caches_the_miss() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_get()
            .times(1)
            .returning(|path| Err(AuditError::MissingDocument(path.to_string())));
        let store = DocumentStore::new(Box::new(backend));

        let first: RepositoryDataset = store.read("missing.json", RepositoryDataset::default());
        assert!(first.is_empty());

        // Second read must not re-hit the backend; the mock allows one call.
        let second: RepositoryDataset = store.read("missing.json", RepositoryDataset::default());
        assert!(second.is_empty());
        assert!(store.events().contains(&StoreEvent::CacheFilled {
            path: "missing.json".to_string(),
            found: false,
        }));
    }

    #[test]
    fn force_refresh_bypasses_cache() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_get()
            .times(2)
            .returning(|_| Ok("{\"public\": [], \"private\": []}".to_string()));
        backend.expect_put().returning(|_, _| Ok(()));
        let store = DocumentStore::new(Box::new(backend));

        let _: RepositoryDataset = store.read("doc.json", RepositoryDataset::default());
        let _: RepositoryDataset =
            store.read_with("doc.json", RepositoryDataset::default(), true);
    }

    #[test]
    fn malformed_document_yields_default() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_get()
            .returning(|_| Ok("not json".to_string()));
        let store = DocumentStore::new(Box::new(backend));

        let read: RepositoryDataset = store.read("broken.json", RepositoryDataset::default());
        assert!(read.is_empty());
    }

    #[test]
    fn backend_write_failure_becomes_false() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_put()
            .returning(|_, _| Err(AuditError::Storage("disk full".to_string())));
        let store = DocumentStore::new(Box::new(backend));

        assert!(!store.save("doc.json", &serde_json::json!({})));
        assert!(store.events().contains(&StoreEvent::Saved {
            path: "doc.json".to_string(),
            ok: false,
        }));
    }

    #[test]
    fn local_backend_round_trips_under_nested_paths() {
        let root = std::env::temp_dir().join(format!(
            "spyglass_store_test_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time")
                .as_nanos()
        ));
        let backend = LocalBackend::new(&root);
        backend
            .put("2024-06-01/data/repositories.json", "{}")
            .expect("write");
        let content = backend
            .get("2024-06-01/data/repositories.json")
            .expect("read");
        assert_eq!(content, "{}");
        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }
}
