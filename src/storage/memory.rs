//! In-Process Storage Module
//!
//! Bounded map backend with TTL expiration, LRU eviction and a reference
//! index for tag purges.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::storage::{
    wildcard_match, LruTracker, Storage, StoredEntry, MAX_KEY_LENGTH, MAX_VALUE_SIZE, WILDCARD,
};

// == Memory Store ==
/// Synchronous core of the in-process backend.
#[derive(Debug)]
pub struct MemoryStore {
    /// Encoded values by key
    entries: HashMap<String, StoredEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Keys reachable through each reference tag
    references: HashMap<String, HashSet<String>>,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Entries dropped to make room
    evictions: u64,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            references: HashMap::new(),
            max_entries,
            evictions: 0,
        }
    }

    // == Set ==
    /// Stores an encoded value under `key` for `ttl` seconds.
    ///
    /// A zero TTL stores nothing. Overwriting a key replaces its references.
    /// At capacity, the least recently used entry is evicted first.
    pub fn set(&mut self, key: String, value: Vec<u8>, ttl: u64, references: &[String]) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if ttl == 0 {
            return Ok(());
        }

        if self.entries.contains_key(&key) {
            self.remove(&key);
        } else if self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    self.drop_entry(&evicted);
                    self.evictions += 1;
                    debug!(key = %evicted, "evicted least recently used entry");
                }
                None => {
                    return Err(CacheError::Storage(
                        "Store is full and eviction failed".to_string(),
                    ))
                }
            }
        }

        for reference in references {
            self.references
                .entry(reference.clone())
                .or_default()
                .insert(key.clone());
        }
        self.entries
            .insert(key.clone(), StoredEntry::new(value, references.to_vec(), ttl));
        self.lru.touch(&key);

        Ok(())
    }

    // == Get ==
    /// Returns the value if present and not expired. Expired entries are dropped.
    pub fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.remove(key);
            return None;
        }

        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.drop_entry(key)
    }

    // == Invalidate ==
    /// Removes every entry with a reference matching one of `patterns`.
    pub fn invalidate(&mut self, patterns: &[String]) -> usize {
        let mut doomed: HashSet<String> = HashSet::new();

        for pattern in patterns {
            if pattern.contains(WILDCARD) {
                for (reference, keys) in &self.references {
                    if wildcard_match(pattern, reference) {
                        doomed.extend(keys.iter().cloned());
                    }
                }
            } else if let Some(keys) = self.references.get(pattern) {
                doomed.extend(keys.iter().cloned());
            }
        }

        doomed.iter().filter(|key| self.remove(key)).count()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.references.clear();
        self.lru.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Number of distinct reference tags currently indexed.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Removes the entry and unlinks it from the reference index.
    fn drop_entry(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };

        for reference in &entry.references {
            if let Some(keys) = self.references.get_mut(reference) {
                keys.remove(key);
                if keys.is_empty() {
                    self.references.remove(reference);
                }
            }
        }
        true
    }
}

// == Memory Storage ==
/// Async [`Storage`] over a shared [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: RwLock::new(MemoryStore::new(max_entries)),
        }
    }

    /// Sweeps expired entries. Returns the number removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn evictions(&self) -> u64 {
        self.store.read().await.evictions()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Write lock: a read touches LRU order and may drop an expired entry
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64, references: &[String]) -> Result<()> {
        self.store
            .write()
            .await
            .set(key.to_string(), value, ttl, references)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.remove(key))
    }

    async fn invalidate(&self, patterns: &[String]) -> Result<usize> {
        Ok(self.store.write().await.invalidate(patterns))
    }

    async fn clear(&self) -> Result<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn entry_count(&self) -> Option<usize> {
        Some(self.len().await)
    }
}
