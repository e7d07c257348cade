//! Dispatch Router
//!
//! Entry point for every intercepted call. Cacheable reads go through the
//! model's cache function, writes purge the model after they succeed, and
//! everything else reaches the executor untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{CacheOptions, StorageConfig};
use crate::dedupe::QueryResult;
use crate::descriptor::{QueryDescriptor, QueryExecutor};
use crate::error::{CacheError, QueryError};
use crate::key::model_pattern;
use crate::policy::{Policy, Route};
use crate::registry::{CacheContext, Registry};
use crate::stats::CacheStats;
use crate::storage::{MemoryStorage, Storage};
use crate::tasks::spawn_cleanup_task;

// == Query Cache ==
/// Read-through, write-invalidating cache in front of a query executor.
pub struct QueryCache {
    policy: Policy,
    registry: Registry,
    context: Arc<CacheContext>,
    /// Extra models purged on each model's writes
    related: HashMap<String, Vec<String>>,
    /// Set when the backend was unreachable at startup
    passthrough_mode: AtomicBool,
    memory: Option<Arc<MemoryStorage>>,
}

impl QueryCache {
    // == Constructors ==
    /// Builds the cache without touching the backend.
    pub fn new(options: CacheOptions) -> Self {
        let (storage, memory) = match &options.storage {
            StorageConfig::Memory { size } => {
                let memory = Arc::new(MemoryStorage::new(*size));
                (memory.clone() as Arc<dyn Storage>, Some(memory))
            }
            StorageConfig::Custom(storage) => (Arc::clone(storage), None),
        };

        let context = Arc::new(CacheContext::new(
            storage,
            Arc::clone(&options.transformer),
            options.hooks.clone(),
        ));

        let related = options
            .models
            .values()
            .filter(|m| !m.invalidate_related.is_empty())
            .map(|m| (m.model.clone(), m.invalidate_related.clone()))
            .collect();

        Self {
            policy: options.policy(),
            registry: Registry::new(
                options.cache_time.clone(),
                options.models.clone(),
                Arc::clone(&context),
            ),
            context,
            related,
            passthrough_mode: AtomicBool::new(false),
            memory,
        }
    }

    /// Builds the cache and checks the backend.
    ///
    /// An unreachable backend is reported and the cache runs every call
    /// straight through to the executor.
    pub async fn connect(options: CacheOptions) -> Self {
        let cache = Self::new(options);
        if let Err(err) = cache.context.storage.ping().await {
            error!(error = %err, "cache backend unreachable, running in passthrough mode");
            cache.context.report_error("", &err);
            cache.passthrough_mode.store(true, Ordering::Relaxed);
        } else {
            info!("cache backend ready");
        }
        cache
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough_mode.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.context.storage)
    }

    pub fn stats(&self) -> CacheStats {
        self.context.stats.snapshot()
    }

    /// Entries the in-process backend dropped to make room.
    pub async fn evictions(&self) -> Option<u64> {
        match &self.memory {
            Some(memory) => Some(memory.evictions().await),
            None => None,
        }
    }

    /// Starts sweeping expired entries when the in-process backend is used.
    pub fn spawn_cleanup(&self, interval_secs: u64) -> Option<JoinHandle<()>> {
        self.memory
            .as_ref()
            .map(|memory| spawn_cleanup_task(Arc::clone(memory), interval_secs))
    }

    // == Handle ==
    /// Dispatches one call. Executor faults reach the caller unchanged.
    pub async fn handle(&self, descriptor: QueryDescriptor) -> QueryResult {
        if self.is_passthrough() {
            return self.passthrough(descriptor).await;
        }

        let route = self.policy.route(&descriptor.model, &descriptor.operation);
        debug!(
            model = %descriptor.model,
            operation = %descriptor.operation,
            route = ?route,
            "dispatching query"
        );

        match route {
            Route::Read(operation) => {
                let function = self.registry.get_or_create(&descriptor.model);
                function.call(operation, descriptor).await
            }
            Route::Write(_) => {
                let model = descriptor.model.clone();
                let result = descriptor.execute().await.map_err(QueryError::from)?;
                self.purge_after_write(&model).await;
                Ok(result)
            }
            Route::Passthrough => self.passthrough(descriptor).await,
        }
    }

    /// Dispatches a call bound to `executor`.
    pub async fn run(
        &self,
        executor: Arc<dyn QueryExecutor>,
        model: &str,
        operation: &str,
        args: Value,
    ) -> QueryResult {
        self.handle(QueryDescriptor::with_executor(executor, model, operation, args))
            .await
    }

    async fn passthrough(&self, descriptor: QueryDescriptor) -> QueryResult {
        self.context.stats.record_passthrough();
        descriptor.execute().await.map_err(QueryError::from)
    }

    // == Invalidation ==
    /// Purges every entry of `model` and of the models it invalidates.
    ///
    /// Returns the number of removed entries.
    pub async fn invalidate_model(&self, model: &str) -> Result<usize, CacheError> {
        self.invalidate_models(&[model.to_string()]).await
    }

    /// Purges several models, with their related models, in one backend call.
    ///
    /// Each target's generation advances before the purge, so reads still
    /// in flight from before it never store their results.
    pub async fn invalidate_models(&self, models: &[String]) -> Result<usize, CacheError> {
        let mut targets: Vec<&str> = Vec::new();
        for model in models {
            targets.push(model);
            if let Some(related) = self.related.get(model) {
                targets.extend(related.iter().map(String::as_str));
            }
        }
        targets.sort_unstable();
        targets.dedup();

        for target in &targets {
            self.context.advance_epoch(target);
        }

        let patterns: Vec<String> = targets.iter().map(|m| model_pattern(m)).collect();
        let removed = self.context.storage.invalidate(&patterns).await?;
        for _ in models {
            self.context.stats.record_invalidation();
        }
        debug!(models = ?models, removed, "purged model entries");
        Ok(removed)
    }

    /// A failed purge never fails the write; it is reported instead.
    async fn purge_after_write(&self, model: &str) {
        if let Err(err) = self.invalidate_model(model).await {
            self.context.report_error(&model_pattern(model), &err);
        }
    }

    /// Drops every stored entry.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.context.storage.clear().await
    }
}
