//! Query Descriptor Module
//!
//! One intercepted data-access call and the executor it defers to.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

// == Executor Seam ==
/// Runs an operation against the real backing store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, model: &str, operation: &str, args: &Value) -> anyhow::Result<Value>;
}

/// Deferred executor invocation bound to one call's arguments.
pub type ExecuteFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<Value>> + Send>;

// == Query Descriptor ==
/// A single call: which model, which operation, with what arguments.
///
/// `execute` is only run if the router decides the call must reach the
/// executor; on a cache hit it is dropped unused.
pub struct QueryDescriptor {
    pub model: String,
    pub operation: String,
    pub args: Value,
    pub(crate) execute: ExecuteFn,
}

impl QueryDescriptor {
    pub fn new<F, Fut>(
        model: impl Into<String>,
        operation: impl Into<String>,
        args: Value,
        execute: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            model: model.into(),
            operation: operation.into(),
            args,
            execute: Box::new(move || execute().boxed()),
        }
    }

    /// Binds the call to `executor`.
    pub fn with_executor(
        executor: Arc<dyn QueryExecutor>,
        model: impl Into<String>,
        operation: impl Into<String>,
        args: Value,
    ) -> Self {
        let model = model.into();
        let operation = operation.into();
        let bound = (model.clone(), operation.clone(), args.clone());

        Self::new(model, operation, args, move || async move {
            let (model, operation, args) = bound;
            executor.execute(&model, &operation, &args).await
        })
    }

    /// Runs the executor directly.
    pub async fn execute(self) -> anyhow::Result<Value> {
        (self.execute)().await
    }
}

impl fmt::Debug for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("model", &self.model)
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
