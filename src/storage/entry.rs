//! Stored Entry Module
//!
//! A single encoded query result with its expiry and reference tags.

use std::time::{SystemTime, UNIX_EPOCH};

// == Stored Entry ==
/// Encoded value held by the in-process backend.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Transformer output
    pub value: Vec<u8>,
    /// Tags this entry can be purged by
    pub references: Vec<String>,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` from now.
    pub fn new(value: Vec<u8>, references: Vec<String>, ttl_seconds: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            references,
            expires_at: now.saturating_add(ttl_seconds.saturating_mul(1000)),
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
