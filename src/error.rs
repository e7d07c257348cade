//! Error types for the query cache
//!
//! Backend and configuration faults live in `CacheError`; everything a
//! caller of the router can receive is a `QueryError`.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Faults raised by the storage backend or detected while validating options.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Backend store, lookup or purge failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transformer failed to encode or decode a value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed options, reported at setup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::Storage(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            CacheError::Serialization(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CacheError::InvalidConfig(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Query Error Enum ==
/// Error returned from a dispatched query.
///
/// Only executor faults reach the caller. Backend faults degrade to a miss
/// or go to the error observer. Executor faults are shared behind an `Arc`
/// so every caller collapsed onto one in-flight read receives the same fault.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// The data access executor failed; the underlying error is kept intact
    #[error("{0}")]
    Executor(Arc<anyhow::Error>),
}

impl QueryError {
    /// Returns the executor's own error.
    pub fn executor_error(&self) -> &anyhow::Error {
        match self {
            QueryError::Executor(err) => err.as_ref(),
        }
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Executor(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache backend operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_is_preserved() {
        let err: QueryError = anyhow::anyhow!("unique constraint failed").into();
        assert_eq!(err.to_string(), "unique constraint failed");
        assert_eq!(
            err.executor_error().to_string(),
            "unique constraint failed"
        );
    }

    #[test]
    fn test_cloned_executor_error_shares_source() {
        let err: QueryError = anyhow::anyhow!("boom").into();
        let cloned = err.clone();
        let (QueryError::Executor(a), QueryError::Executor(b)) = (err, cloned);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_error_status_codes() {
        let response = CacheError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = CacheError::Storage("down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
