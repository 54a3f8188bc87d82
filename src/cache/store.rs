//! Cache store capability and in-memory implementations.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// A cached operation result: the status code and payload that would have
/// been produced by running the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: u16,
    pub payload: Value,
}

/// Best-effort store failure. Logged at warn level by the dispatch pipeline
/// and swallowed; a failure to cache never fails the request.
#[derive(Debug, Error)]
#[error("cache store `{name}` failed: {reason}")]
pub struct CacheStoreError {
    pub name: String,
    pub reason: String,
}

/// Pluggable key-value capability backing one named response cache.
///
/// `get` and `set` are individually atomic, but nothing is transactional
/// across the read-then-later-write gap: two concurrent misses on the same
/// key will both run the handler and the later `set` wins. At-most-once
/// population is NOT guaranteed.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheStoreError>;
    fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheStoreError>;
}

/// Unbounded concurrent in-memory store.
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheStoreError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

/// LRU-bounded in-memory store; the least recently read entry is evicted
/// once `capacity` is reached.
pub struct BoundedStore {
    name: String,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl BoundedStore {
    pub fn new(name: impl Into<String>, capacity: NonZeroUsize) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl CacheStore for BoundedStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheStoreError> {
        let mut entries = self.entries.lock().map_err(|e| CacheStoreError {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheStoreError> {
        let mut entries = self.entries.lock().map_err(|e| CacheStoreError {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        entries.put(key.to_string(), entry);
        Ok(())
    }
}

/// Store construction options attached to a cache policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheOptions {
    /// Bound the cache to this many entries (LRU eviction). Unbounded when
    /// absent or zero.
    pub max_entries: Option<usize>,
}

/// Registry of named cache stores shared across operations.
pub struct CacheManager {
    caches: DashMap<String, Arc<dyn CacheStore>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            caches: DashMap::new(),
        }
    }

    /// Create the named cache if it does not exist yet and return it.
    ///
    /// Idempotent: an existing cache is returned untouched, entries are never
    /// reset. Later `options` for the same name are ignored.
    pub fn create(&self, name: &str, options: &CacheOptions) -> Arc<dyn CacheStore> {
        Arc::clone(
            self.caches
                .entry(name.to_string())
                .or_insert_with(|| {
                    info!(cache = %name, max_entries = ?options.max_entries, "cache created");
                    match options.max_entries.and_then(NonZeroUsize::new) {
                        Some(capacity) => Arc::new(BoundedStore::new(name, capacity)),
                        None => Arc::new(MemoryStore::new()),
                    }
                })
                .value(),
        )
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        self.caches.get(name).map(|cache| Arc::clone(cache.value()))
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}
