//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for a manual purge (POST /invalidate)
///
/// # Fields
/// - `models`: Models whose entries are purged, together with the models
///   each of them invalidates
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub models: Vec<String>,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.models.is_empty() {
            return Some("At least one model is required".to_string());
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Some("Model names cannot be empty".to_string());
        }
        None
    }
}
