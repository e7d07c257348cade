//! Query Cache - read-through, write-invalidating cache for ORM queries
//!
//! Sits between an application and its data-access layer. Cacheable reads
//! are answered from a key-value backend with concurrent identical reads
//! collapsed onto one execution; writes purge every cached read of the
//! written model once they succeed; everything else goes straight through.

pub mod api;
pub mod config;
pub mod dedupe;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod key;
pub mod models;
pub mod policy;
pub mod registry;
pub mod router;
pub mod stats;
pub mod storage;
pub mod tasks;
pub mod telemetry;
pub mod transformer;

pub use api::AppState;
pub use config::{CacheOptions, Config, ModelOptions, StorageConfig, Ttl};
pub use descriptor::{QueryDescriptor, QueryExecutor};
pub use error::{CacheError, QueryError};
pub use policy::{Operation, Route};
pub use router::QueryCache;
pub use storage::{MemoryStorage, Storage};
pub use tasks::spawn_cleanup_task;
pub use transformer::{FnTransformer, JsonTransformer, Transformer};
