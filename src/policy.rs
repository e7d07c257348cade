//! Policy Module
//!
//! Operation vocabulary and the routing decision for each call.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

// == Operation ==
/// Every operation kind the query interface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindFirst,
    FindFirstOrThrow,
    FindUnique,
    FindUniqueOrThrow,
    FindMany,
    Aggregate,
    Count,
    GroupBy,
    FindRaw,
    RunCommandRaw,
    QueryRaw,
    AggregateRaw,
    Create,
    CreateMany,
    CreateManyAndReturn,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    ExecuteRaw,
    ExecuteRawUnsafe,
}

/// Whether an operation reads or mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Read,
    Write,
}

/// Name, variant and class for each operation kind.
const OPERATIONS: [(&str, Operation, OperationClass); 22] = [
    ("findFirst", Operation::FindFirst, OperationClass::Read),
    ("findFirstOrThrow", Operation::FindFirstOrThrow, OperationClass::Read),
    ("findUnique", Operation::FindUnique, OperationClass::Read),
    ("findUniqueOrThrow", Operation::FindUniqueOrThrow, OperationClass::Read),
    ("findMany", Operation::FindMany, OperationClass::Read),
    ("aggregate", Operation::Aggregate, OperationClass::Read),
    ("count", Operation::Count, OperationClass::Read),
    ("groupBy", Operation::GroupBy, OperationClass::Read),
    ("findRaw", Operation::FindRaw, OperationClass::Read),
    ("runCommandRaw", Operation::RunCommandRaw, OperationClass::Read),
    ("queryRaw", Operation::QueryRaw, OperationClass::Read),
    ("aggregateRaw", Operation::AggregateRaw, OperationClass::Read),
    ("create", Operation::Create, OperationClass::Write),
    ("createMany", Operation::CreateMany, OperationClass::Write),
    ("createManyAndReturn", Operation::CreateManyAndReturn, OperationClass::Write),
    ("update", Operation::Update, OperationClass::Write),
    ("updateMany", Operation::UpdateMany, OperationClass::Write),
    ("upsert", Operation::Upsert, OperationClass::Write),
    ("delete", Operation::Delete, OperationClass::Write),
    ("deleteMany", Operation::DeleteMany, OperationClass::Write),
    ("executeRaw", Operation::ExecuteRaw, OperationClass::Write),
    ("executeRawUnsafe", Operation::ExecuteRawUnsafe, OperationClass::Write),
];

impl Operation {
    /// All operation kinds, reads first.
    pub fn all() -> impl Iterator<Item = Operation> {
        OPERATIONS.iter().map(|(_, op, _)| *op)
    }

    /// The literal name used by the query interface.
    pub fn as_str(&self) -> &'static str {
        self.row().0
    }

    pub fn class(&self) -> OperationClass {
        self.row().2
    }

    pub fn is_read(&self) -> bool {
        self.class() == OperationClass::Read
    }

    fn row(&self) -> &'static (&'static str, Operation, OperationClass) {
        // Table order matches declaration order
        &OPERATIONS[*self as usize]
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OPERATIONS
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|(_, op, _)| *op)
            .ok_or_else(|| CacheError::InvalidConfig(format!("unknown operation kind '{}'", s)))
    }
}

// == Route ==
/// Path a single call takes through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Served through the model's cache function
    Read(Operation),
    /// Executed, then the model's entries are purged
    Write(Operation),
    /// Executed directly
    Passthrough,
}

// == Policy ==
/// Read-only exclusion tables built from the options.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    excluded_models: HashSet<String>,
    excluded_operations: HashSet<Operation>,
    model_excluded_operations: HashMap<String, HashSet<Operation>>,
}

impl Policy {
    pub fn new(
        excluded_models: impl IntoIterator<Item = String>,
        excluded_operations: impl IntoIterator<Item = Operation>,
    ) -> Self {
        Self {
            excluded_models: excluded_models.into_iter().collect(),
            excluded_operations: excluded_operations.into_iter().collect(),
            model_excluded_operations: HashMap::new(),
        }
    }

    /// Excludes operations for one model only.
    pub fn exclude_for_model(
        mut self,
        model: impl Into<String>,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Self {
        self.model_excluded_operations
            .entry(model.into())
            .or_default()
            .extend(operations);
        self
    }

    /// Classifies a call by model name and raw operation name.
    ///
    /// An operation name outside the vocabulary is passed through.
    pub fn route(&self, model: &str, operation: &str) -> Route {
        let Ok(op) = operation.parse::<Operation>() else {
            return Route::Passthrough;
        };

        match op.class() {
            OperationClass::Read if self.is_cacheable(model, op) => Route::Read(op),
            OperationClass::Read => Route::Passthrough,
            OperationClass::Write => Route::Write(op),
        }
    }

    fn is_cacheable(&self, model: &str, op: Operation) -> bool {
        if self.excluded_operations.contains(&op) || self.excluded_models.contains(model) {
            return false;
        }
        !self
            .model_excluded_operations
            .get(model)
            .is_some_and(|ops| ops.contains(&op))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const READS: [&str; 12] = [
        "findFirst",
        "findFirstOrThrow",
        "findUnique",
        "findUniqueOrThrow",
        "findMany",
        "aggregate",
        "count",
        "groupBy",
        "findRaw",
        "runCommandRaw",
        "queryRaw",
        "aggregateRaw",
    ];

    const WRITES: [&str; 10] = [
        "create",
        "createMany",
        "createManyAndReturn",
        "update",
        "updateMany",
        "upsert",
        "delete",
        "deleteMany",
        "executeRaw",
        "executeRawUnsafe",
    ];

    #[test]
    fn test_table_matches_declaration_order() {
        for op in Operation::all() {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_read_vocabulary() {
        let policy = Policy::default();
        for name in READS {
            let op: Operation = name.parse().unwrap();
            assert!(op.is_read(), "{} should be a read", name);
            assert_eq!(policy.route("User", name), Route::Read(op));
        }
    }

    #[test]
    fn test_write_vocabulary() {
        let policy = Policy::default();
        for name in WRITES {
            let op: Operation = name.parse().unwrap();
            assert_eq!(op.class(), OperationClass::Write);
            assert_eq!(policy.route("User", name), Route::Write(op));
        }
    }

    #[test]
    fn test_unknown_operation_passes_through() {
        let policy = Policy::default();
        assert_eq!(policy.route("User", "findSomething"), Route::Passthrough);
        assert!("findSomething".parse::<Operation>().is_err());
    }

    #[test]
    fn test_excluded_model_passes_through() {
        let policy = Policy::new(vec!["Session".to_string()], vec![]);
        assert_eq!(policy.route("Session", "findMany"), Route::Passthrough);
        assert_eq!(
            policy.route("User", "findMany"),
            Route::Read(Operation::FindMany)
        );
    }

    #[test]
    fn test_excluded_model_still_invalidates_on_write() {
        let policy = Policy::new(vec!["Session".to_string()], vec![]);
        assert_eq!(
            policy.route("Session", "update"),
            Route::Write(Operation::Update)
        );
    }

    #[test]
    fn test_excluded_operation_passes_through() {
        let policy = Policy::new(vec![], vec![Operation::Count]);
        assert_eq!(policy.route("User", "count"), Route::Passthrough);
        assert_eq!(
            policy.route("User", "findMany"),
            Route::Read(Operation::FindMany)
        );
    }

    #[test]
    fn test_model_scoped_exclusion() {
        let policy = Policy::default().exclude_for_model("Post", vec![Operation::FindMany]);
        assert_eq!(policy.route("Post", "findMany"), Route::Passthrough);
        assert_eq!(
            policy.route("Post", "findUnique"),
            Route::Read(Operation::FindUnique)
        );
        assert_eq!(
            policy.route("User", "findMany"),
            Route::Read(Operation::FindMany)
        );
    }
}
