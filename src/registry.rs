//! Cache Function Registry
//!
//! One deduplicating read-through function per model, created on the
//! model's first cacheable read and kept for the life of the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ModelOptions, ReferenceFn, Ttl};
use crate::dedupe::{InflightTable, Participation, QueryResult};
use crate::descriptor::{ExecuteFn, QueryDescriptor};
use crate::error::{CacheError, QueryError};
use crate::hooks::Hooks;
use crate::key::{cache_key, model_tag};
use crate::policy::Operation;
use crate::stats::StatsRecorder;
use crate::storage::Storage;
use crate::transformer::Transformer;

// == Cache Context ==
/// Collaborators shared by every cache function.
pub struct CacheContext {
    pub storage: Arc<dyn Storage>,
    pub transformer: Arc<dyn Transformer>,
    pub hooks: Hooks,
    pub stats: Arc<StatsRecorder>,
    /// Purge generation per model; a read only stores under the generation it started in
    epochs: DashMap<String, u64>,
}

impl CacheContext {
    pub fn new(storage: Arc<dyn Storage>, transformer: Arc<dyn Transformer>, hooks: Hooks) -> Self {
        Self {
            storage,
            transformer,
            hooks,
            stats: Arc::new(StatsRecorder::new()),
            epochs: DashMap::new(),
        }
    }

    /// Current purge generation of `model`.
    pub fn epoch(&self, model: &str) -> u64 {
        self.epochs.get(model).map(|epoch| *epoch).unwrap_or(0)
    }

    /// Starts a new purge generation for `model`.
    ///
    /// Must happen before the model's entries are purged: a read that stored
    /// under the old generation is then either removed by the purge or sees
    /// the new generation when it re-checks.
    pub fn advance_epoch(&self, model: &str) {
        *self.epochs.entry(model.to_string()).or_insert(0) += 1;
    }

    /// Routes a backend fault to the error observer.
    pub fn report_error(&self, key: &str, err: &CacheError) {
        warn!(key = %key, error = %err, "cache backend fault");
        self.stats.record_error();
        self.hooks.error(key);
    }
}

// == Entity Cache Function ==
/// Read-through function bound to exactly one model.
pub struct EntityCacheFunction {
    model: String,
    key_prefix: String,
    ttl: Ttl,
    references: Option<ReferenceFn>,
    inflight: InflightTable,
    context: Arc<CacheContext>,
}

impl EntityCacheFunction {
    pub fn new(
        model: impl Into<String>,
        default_ttl: Ttl,
        overrides: Option<&ModelOptions>,
        context: Arc<CacheContext>,
    ) -> Self {
        let model = model.into();
        Self {
            key_prefix: overrides
                .and_then(|o| o.cache_key.clone())
                .unwrap_or_else(|| model.clone()),
            ttl: overrides
                .and_then(|o| o.cache_time.clone())
                .unwrap_or(default_ttl),
            references: overrides.and_then(|o| o.references.clone()),
            inflight: InflightTable::new(),
            context,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn key_for(&self, operation: Operation, args: &Value) -> String {
        cache_key(&self.key_prefix, &self.model, operation.as_str(), args)
    }

    /// Tags for an entry; the entity-wide tag always comes first.
    pub fn references_for(&self, args: &Value, key: &str) -> Vec<String> {
        let mut tags = vec![model_tag(&self.model, key)];
        if let Some(extra) = &self.references {
            tags.extend(extra(&self.model, args, key));
        }
        tags
    }

    /// Number of reads of this model currently executing.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    // == Call ==
    /// Answers a read from storage, an identical in-flight read, or the
    /// descriptor's executor, in that order.
    pub async fn call(self: &Arc<Self>, operation: Operation, descriptor: QueryDescriptor) -> QueryResult {
        let QueryDescriptor { args, execute, .. } = descriptor;
        let key = self.key_for(operation, &args);
        let references = self.references_for(&args, &key);

        // Reads issued after a purge never join a run that started before it
        let epoch = self.context.epoch(&self.model);
        let flight_key = format!("{}#{}", epoch, key);

        let this = Arc::clone(self);
        let leader_key = key.clone();
        let (result, participation) = self
            .inflight
            .run(&flight_key, move || {
                async move {
                    this.read_through(&leader_key, &references, epoch, execute)
                        .await
                }
                .boxed()
            })
            .await;

        if participation == Participation::Joined {
            debug!(model = %self.model, key = %key, "joined in-flight read");
            self.context.stats.record_dedupe();
            self.context.hooks.dedupe(&key);
        }
        result
    }

    async fn read_through(
        &self,
        key: &str,
        references: &[String],
        epoch: u64,
        execute: ExecuteFn,
    ) -> QueryResult {
        let ctx = &self.context;

        if !self.ttl.is_disabled() {
            if let Some(value) = self.lookup(key).await {
                debug!(model = %self.model, key = %key, "cache hit");
                ctx.stats.record_hit();
                ctx.hooks.hit(key);
                return Ok(value);
            }
        }

        debug!(model = %self.model, key = %key, "cache miss");
        ctx.stats.record_miss();
        ctx.hooks.miss(key);

        let value = execute().await.map_err(QueryError::from)?;

        let ttl = self.ttl.for_result(&value);
        if ttl > 0 {
            self.store_unless_purged(key, &value, ttl, references, epoch)
                .await;
        }
        Ok(value)
    }

    /// Stores a result only if no purge of the model began since `epoch`.
    async fn store_unless_purged(
        &self,
        key: &str,
        value: &Value,
        ttl: u64,
        references: &[String],
        epoch: u64,
    ) {
        let ctx = &self.context;
        if ctx.epoch(&self.model) != epoch {
            debug!(model = %self.model, key = %key, "model purged during read, not storing");
            return;
        }

        self.store(key, value, ttl, references).await;

        // A purge that began while storing may have missed this entry
        if ctx.epoch(&self.model) != epoch {
            debug!(model = %self.model, key = %key, "model purged while storing, dropping entry");
            if let Err(err) = ctx.storage.remove(key).await {
                ctx.report_error(key, &err);
            }
        }
    }

    /// Storage faults and undecodable entries count as a miss.
    async fn lookup(&self, key: &str) -> Option<Value> {
        let ctx = &self.context;
        let bytes = match ctx.storage.get(key).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                ctx.report_error(key, &err);
                return None;
            }
        };

        match ctx.transformer.deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                ctx.report_error(key, &err);
                if let Err(err) = ctx.storage.remove(key).await {
                    ctx.report_error(key, &err);
                }
                None
            }
        }
    }

    async fn store(&self, key: &str, value: &Value, ttl: u64, references: &[String]) {
        let ctx = &self.context;
        let stored = match ctx.transformer.serialize(value) {
            Ok(bytes) => ctx.storage.set(key, bytes, ttl, references).await,
            Err(err) => Err(err),
        };
        if let Err(err) = stored {
            ctx.report_error(key, &err);
        }
    }
}

impl fmt::Debug for EntityCacheFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCacheFunction")
            .field("model", &self.model)
            .field("key_prefix", &self.key_prefix)
            .field("ttl", &self.ttl)
            .field("in_flight", &self.inflight.len())
            .finish()
    }
}

// == Registry ==
/// Model name to cache function map.
pub struct Registry {
    functions: DashMap<String, Arc<EntityCacheFunction>>,
    default_ttl: Ttl,
    overrides: HashMap<String, ModelOptions>,
    context: Arc<CacheContext>,
}

impl Registry {
    pub fn new(
        default_ttl: Ttl,
        overrides: HashMap<String, ModelOptions>,
        context: Arc<CacheContext>,
    ) -> Self {
        Self {
            functions: DashMap::new(),
            default_ttl,
            overrides,
            context,
        }
    }

    /// Returns the model's function, defining it on first use.
    ///
    /// Concurrent first calls for one model all receive the same instance.
    pub fn get_or_create(&self, model: &str) -> Arc<EntityCacheFunction> {
        if let Some(function) = self.functions.get(model) {
            return Arc::clone(function.value());
        }

        let entry = self.functions.entry(model.to_string()).or_insert_with(|| {
            debug!(model = %model, "defining cache function");
            Arc::new(EntityCacheFunction::new(
                model,
                self.default_ttl.clone(),
                self.overrides.get(model),
                Arc::clone(&self.context),
            ))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, model: &str) -> Option<Arc<EntityCacheFunction>> {
        self.functions.get(model).map(|f| Arc::clone(f.value()))
    }

    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.functions.iter().map(|f| f.key().clone()).collect();
        models.sort();
        models
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Drops every function. Reads already holding one finish normally.
    pub fn teardown(&self) {
        self.functions.clear();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.models())
            .finish_non_exhaustive()
    }
}
