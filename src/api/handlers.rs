//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, HealthResponse, InvalidateRequest, InvalidateResponse, StatsResponse,
};
use crate::router::QueryCache;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<QueryCache>,
}

impl AppState {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self { cache }
    }

    /// Builds a cache from options without probing the backend.
    pub fn from_options(options: CacheOptions) -> Self {
        Self::new(Arc::new(QueryCache::new(options)))
    }
}

/// Handler for POST /invalidate
///
/// Purges each listed model together with the models it invalidates.
///
/// All models go to the backend in one purge, so a backend fault leaves
/// none of them reported as purged.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.invalidate_models(&req.models).await?;

    Ok(Json(InvalidateResponse::new(req.models, removed)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear().await?;
    Ok(Json(ClearResponse::new()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let total_entries = state.cache.storage().entry_count().await;
    let evictions = state.cache.evictions().await;

    Json(StatsResponse::new(
        state.cache.stats(),
        total_entries,
        evictions,
        state.cache.registry().models(),
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.is_passthrough()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageConfig, Ttl};
    use crate::descriptor::QueryDescriptor;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::from_options(
            CacheOptions::builder()
                .cache_time(Ttl::Fixed(60))
                .build()
                .unwrap(),
        )
    }

    async fn warm(state: &AppState, model: &str) {
        state
            .cache
            .handle(QueryDescriptor::new(model, "findMany", json!({}), || async {
                Ok(json!([]))
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let state = test_state();
        warm(&state, "Post").await;
        warm(&state, "User").await;

        let req = InvalidateRequest {
            models: vec!["Post".to_string()],
        };
        let resp = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(resp.removed, 1);
        assert_eq!(state.cache.storage().entry_count().await, Some(1));
    }

    #[tokio::test]
    async fn test_invalidate_handler_rejects_empty_list() {
        let state = test_state();
        let req = InvalidateRequest { models: vec![] };

        let result = invalidate_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state();
        warm(&state, "Post").await;

        clear_handler(State(state.clone())).await.unwrap();
        assert_eq!(state.cache.storage().entry_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        warm(&state, "Post").await;
        warm(&state, "Post").await;

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.counters.hits, 1);
        assert_eq!(stats.counters.misses, 1);
        assert_eq!(stats.total_entries, Some(1));
        assert_eq!(stats.models, vec!["Post".to_string()]);
    }

    #[tokio::test]
    async fn test_stats_handler_reports_evictions() {
        let state = AppState::from_options(
            CacheOptions::builder()
                .storage(StorageConfig::Memory { size: 1 })
                .cache_time(Ttl::Fixed(60))
                .build()
                .unwrap(),
        );
        warm(&state, "Post").await;
        warm(&state, "User").await;

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.evictions, Some(1));
        assert_eq!(stats.total_entries, Some(1));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let health = health_handler(State(test_state())).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.mode, "caching");
    }
}
