//! Configuration Module
//!
//! Environment-driven settings and the validated options the cache is built
//! from.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CacheError, Result};
use crate::hooks::{Hook, Hooks};
use crate::key::TAG_SEPARATOR;
use crate::policy::{Operation, Policy};
use crate::storage::{Storage, WILDCARD};
use crate::transformer::{JsonTransformer, Transformer};

/// Default TTL in seconds. Zero keeps caching off until a deployment opts in.
pub const DEFAULT_CACHE_TIME: u64 = 0;

/// Default capacity of the in-process backend.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// == Environment Config ==
/// Plain settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Default TTL in seconds
    pub cache_time: u64,
    /// Capacity of the in-process backend
    pub max_entries: usize,
    /// Expired-entry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Models never cached
    pub exclude_models: Vec<String>,
    /// Operation names never cached
    pub exclude_methods: Vec<String>,
}

impl Config {
    /// Loads settings from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TIME` - Default TTL in seconds (default: 0)
    /// - `MAX_ENTRIES` - In-process capacity (default: 1000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `EXCLUDE_MODELS` - Comma separated model names (default: none)
    /// - `EXCLUDE_METHODS` - Comma separated operation names (default: none)
    pub fn from_env() -> Self {
        Self {
            cache_time: env::var("CACHE_TIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CACHE_TIME),
            max_entries: env::var("MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ENTRIES),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            exclude_models: env::var("EXCLUDE_MODELS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            exclude_methods: env::var("EXCLUDE_METHODS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_time: DEFAULT_CACHE_TIME,
            max_entries: DEFAULT_MAX_ENTRIES,
            cleanup_interval: 1,
            exclude_models: Vec::new(),
            exclude_methods: Vec::new(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// == TTL ==
/// How long a read result stays cached.
#[derive(Clone)]
pub enum Ttl {
    /// Seconds; zero disables caching
    Fixed(u64),
    /// Seconds computed from the result being stored
    Computed(Arc<dyn Fn(&Value) -> u64 + Send + Sync>),
}

impl Ttl {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Value) -> u64 + Send + Sync + 'static,
    {
        Ttl::Computed(Arc::new(f))
    }

    pub fn for_result(&self, result: &Value) -> u64 {
        match self {
            Ttl::Fixed(secs) => *secs,
            Ttl::Computed(f) => f(result),
        }
    }

    /// True when no result can ever be stored.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Ttl::Fixed(0))
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::Fixed(DEFAULT_CACHE_TIME)
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Fixed(secs) => f.debug_tuple("Fixed").field(secs).finish(),
            Ttl::Computed(_) => f.write_str("Computed"),
        }
    }
}

// == Storage Selection ==
/// Backend the cache stores results in.
#[derive(Clone)]
pub enum StorageConfig {
    /// Bounded in-process map
    Memory { size: usize },
    /// Any other backend, e.g. a networked key-value service
    Custom(Arc<dyn Storage>),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            size: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfig::Memory { size } => f.debug_struct("Memory").field("size", size).finish(),
            StorageConfig::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Extra tags for an entry: `(model, args, key) -> tags`.
pub type ReferenceFn = Arc<dyn Fn(&str, &Value, &str) -> Vec<String> + Send + Sync>;

// == Per-Model Overrides ==
/// Settings that apply to a single model.
#[derive(Clone, Default)]
pub struct ModelOptions {
    pub model: String,
    /// Key prefix used instead of the model name
    pub cache_key: Option<String>,
    pub cache_time: Option<Ttl>,
    pub exclude_methods: Vec<Operation>,
    /// Models purged alongside this one on every write
    pub invalidate_related: Vec<String>,
    /// Tags added after the entity-wide tag
    pub references: Option<ReferenceFn>,
}

impl ModelOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn cache_key(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key = Some(prefix.into());
        self
    }

    pub fn cache_time(mut self, ttl: Ttl) -> Self {
        self.cache_time = Some(ttl);
        self
    }

    pub fn exclude_methods(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.exclude_methods.extend(ops);
        self
    }

    pub fn invalidate_related<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidate_related.extend(models.into_iter().map(Into::into));
        self
    }

    pub fn references<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value, &str) -> Vec<String> + Send + Sync + 'static,
    {
        self.references = Some(Arc::new(f));
        self
    }

    fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(CacheError::InvalidConfig(
                "model override needs a model name".to_string(),
            ));
        }
        if let Some(prefix) = &self.cache_key {
            if prefix.is_empty() || prefix.contains(TAG_SEPARATOR) || prefix.contains(WILDCARD) {
                return Err(CacheError::InvalidConfig(format!(
                    "cache key prefix '{}' for model '{}' must be non-empty without '{}' or '{}'",
                    prefix, self.model, TAG_SEPARATOR, WILDCARD
                )));
            }
        }
        if let Some(op) = self.exclude_methods.iter().find(|op| !op.is_read()) {
            return Err(CacheError::InvalidConfig(format!(
                "'{}' excluded for model '{}' is not a read operation",
                op, self.model
            )));
        }
        if self.invalidate_related.iter().any(String::is_empty) {
            return Err(CacheError::InvalidConfig(format!(
                "related model list for '{}' contains an empty name",
                self.model
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptions")
            .field("model", &self.model)
            .field("cache_key", &self.cache_key)
            .field("cache_time", &self.cache_time)
            .field("exclude_methods", &self.exclude_methods)
            .field("invalidate_related", &self.invalidate_related)
            .field("references", &self.references.is_some())
            .finish()
    }
}

// == Cache Options ==
/// Validated options; read-only once built.
#[derive(Clone)]
pub struct CacheOptions {
    pub storage: StorageConfig,
    pub cache_time: Ttl,
    pub exclude_models: Vec<String>,
    pub exclude_methods: Vec<Operation>,
    pub models: HashMap<String, ModelOptions>,
    pub hooks: Hooks,
    pub transformer: Arc<dyn Transformer>,
}

impl CacheOptions {
    pub fn builder() -> CacheOptionsBuilder {
        CacheOptionsBuilder::default()
    }

    /// Builds options from environment settings with the in-process backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder()
            .storage(StorageConfig::Memory {
                size: config.max_entries,
            })
            .cache_time(Ttl::Fixed(config.cache_time))
            .exclude_models(config.exclude_models.clone())
            .exclude_methods(config.exclude_methods.clone())
            .build()
    }

    /// Exclusion tables for the router.
    pub fn policy(&self) -> Policy {
        self.models.values().fold(
            Policy::new(
                self.exclude_models.iter().cloned(),
                self.exclude_methods.iter().copied(),
            ),
            |policy, model| {
                policy.exclude_for_model(model.model.clone(), model.exclude_methods.iter().copied())
            },
        )
    }

    pub fn model(&self, model: &str) -> Option<&ModelOptions> {
        self.models.get(model)
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("storage", &self.storage)
            .field("cache_time", &self.cache_time)
            .field("exclude_models", &self.exclude_models)
            .field("exclude_methods", &self.exclude_methods)
            .field("models", &self.models.values().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Collects options; `build` reports every configuration fault up front.
#[derive(Default)]
pub struct CacheOptionsBuilder {
    storage: StorageConfig,
    cache_time: Ttl,
    exclude_models: Vec<String>,
    exclude_methods: Vec<String>,
    models: Vec<ModelOptions>,
    hooks: Hooks,
    transformer: Option<Arc<dyn Transformer>>,
}

impl CacheOptionsBuilder {
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn cache_time(mut self, ttl: Ttl) -> Self {
        self.cache_time = ttl;
        self
    }

    pub fn exclude_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_models.extend(models.into_iter().map(Into::into));
        self
    }

    /// Operation names are checked against the vocabulary in `build`.
    pub fn exclude_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn model(mut self, model: ModelOptions) -> Self {
        self.models.push(model);
        self
    }

    pub fn on_hit(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_hit = Some(Arc::new(hook) as Hook);
        self
    }

    pub fn on_miss(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_miss = Some(Arc::new(hook) as Hook);
        self
    }

    pub fn on_dedupe(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_dedupe = Some(Arc::new(hook) as Hook);
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(hook) as Hook);
        self
    }

    pub fn transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer) as Arc<dyn Transformer>);
        self
    }

    pub fn build(self) -> Result<CacheOptions> {
        if let StorageConfig::Memory { size: 0 } = self.storage {
            return Err(CacheError::InvalidConfig(
                "in-process storage needs a size of at least 1".to_string(),
            ));
        }

        if self.exclude_models.iter().any(String::is_empty) {
            return Err(CacheError::InvalidConfig(
                "excluded model list contains an empty name".to_string(),
            ));
        }

        let mut exclude_methods = Vec::with_capacity(self.exclude_methods.len());
        for name in &self.exclude_methods {
            let op: Operation = name.parse()?;
            if !op.is_read() {
                return Err(CacheError::InvalidConfig(format!(
                    "'{}' is not a read operation and cannot be excluded from caching",
                    name
                )));
            }
            exclude_methods.push(op);
        }

        let mut models = HashMap::with_capacity(self.models.len());
        for model in self.models {
            model.validate()?;
            if models.contains_key(&model.model) {
                return Err(CacheError::InvalidConfig(format!(
                    "model '{}' is configured more than once",
                    model.model
                )));
            }
            models.insert(model.model.clone(), model);
        }

        Ok(CacheOptions {
            storage: self.storage,
            cache_time: self.cache_time,
            exclude_models: self.exclude_models,
            exclude_methods,
            models,
            hooks: self.hooks,
            transformer: self
                .transformer
                .unwrap_or_else(|| Arc::new(JsonTransformer) as Arc<dyn Transformer>),
        })
    }
}
