//! In-Flight Deduplication
//!
//! Collapses concurrent identical reads onto a single execution.
//!
//! The first caller for a key installs a shared future in the table and
//! drives it; later callers for the same key await clones of it. The
//! entry is removed when the first caller's future settles or is dropped,
//! so the next read for that key starts fresh.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

use crate::error::QueryError;

/// Outcome every deduplicated caller receives.
pub type QueryResult = Result<Value, QueryError>;

type SharedQuery = Shared<BoxFuture<'static, QueryResult>>;

/// How a caller took part in a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// Started the execution
    Leader,
    /// Joined one already in flight
    Joined,
}

// == Inflight Table ==
#[derive(Default)]
pub struct InflightTable {
    in_flight: DashMap<String, SharedQuery>,
}

impl InflightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `start()` for `key` unless an identical run is in flight, in
    /// which case its outcome is awaited instead.
    ///
    /// The check and the insert happen under the same shard lock, so two
    /// racing callers can never both become leader.
    pub async fn run<F>(&self, key: &str, start: F) -> (QueryResult, Participation)
    where
        F: FnOnce() -> BoxFuture<'static, QueryResult>,
    {
        let (future, guard) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let future = start().shared();
                entry.insert(future.clone());
                let guard = InflightGuard {
                    table: &self.in_flight,
                    key,
                    future: future.clone(),
                };
                (future, Some(guard))
            }
        };

        let participation = if guard.is_some() {
            Participation::Leader
        } else {
            Participation::Joined
        };

        let result = future.await;
        drop(guard);
        (result, participation)
    }

    /// Number of keys currently executing.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Removes the leader's entry on settle or cancellation.
struct InflightGuard<'a> {
    table: &'a DashMap<String, SharedQuery>,
    key: &'a str,
    future: SharedQuery,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        // Only remove our own run; a newer one may already own the key
        self.table
            .remove_if(self.key, |_, current| current.ptr_eq(&self.future));
    }
}
