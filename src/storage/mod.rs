//! Storage Module
//!
//! The key-value backend seam and the bundled in-process backend.
//!
//! A backend stores encoded values under string keys with a TTL, indexes
//! each entry by its reference tags, and removes every entry whose tag
//! matches a purge pattern.

mod entry;
mod lru;
mod memory;

#[cfg(test)]
mod property_tests;

use async_trait::async_trait;

use crate::error::Result;

pub use entry::StoredEntry;
pub use lru::LruTracker;
pub use memory::{MemoryStorage, MemoryStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024; // 8 MB

/// Wildcard accepted in purge patterns.
pub const WILDCARD: char = '*';

// == Storage Trait ==
/// Key-value cache service the router stores query results in.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the live value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` for `ttl` seconds, reachable through `references`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64, references: &[String]) -> Result<()>;

    /// Removes a single key. Returns whether it was present.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Removes every entry carrying a reference matching any pattern.
    ///
    /// Returns the number of removed entries.
    async fn invalidate(&self, patterns: &[String]) -> Result<usize>;

    /// Drops every entry.
    async fn clear(&self) -> Result<()>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Number of live entries, when the backend can tell cheaply.
    async fn entry_count(&self) -> Option<usize> {
        None
    }
}

// == Pattern Matching ==
/// Matches `text` against a pattern where `*` stands for any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last star and the text index it was matched against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == WILDCARD {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == WILDCARD)
}
