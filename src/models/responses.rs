//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::stats::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: CacheStats,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// Stored entries, when the backend reports it
    pub total_entries: Option<usize>,
    /// Entries dropped to make room, for the in-process backend
    pub evictions: Option<u64>,
    /// Models with a defined cache function
    pub models: Vec<String>,
}

impl StatsResponse {
    pub fn new(
        counters: CacheStats,
        total_entries: Option<usize>,
        evictions: Option<u64>,
        models: Vec<String>,
    ) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
            total_entries,
            evictions,
            models,
        }
    }
}

/// Response body for a manual purge (POST /invalidate)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub models: Vec<String>,
    /// Entries removed across all purged models
    pub removed: usize,
}

impl InvalidateResponse {
    pub fn new(models: Vec<String>, removed: usize) -> Self {
        Self {
            message: format!("Purged {} entries for {}", removed, models.join(", ")),
            models,
            removed,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared successfully".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// "caching", or "passthrough" when the backend was unreachable
    pub mode: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(passthrough: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            mode: if passthrough { "passthrough" } else { "caching" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
