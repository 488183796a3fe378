//! Executor-specific errors.

use crate::catalog::{CatalogError, SchemaError};
use crate::datum::FieldType;
use crate::storage::{PoolError, StorageError};
use crate::tuple::TupleError;

/// Errors that can occur during query execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The memory pool cannot supply the slots an algorithm needs.
    #[error(transparent)]
    ResourceExhausted(#[from] PoolError),

    /// Unknown or ambiguous column in a predicate or column list.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A tuple does not match the target schema.
    #[error(transparent)]
    Tuple(#[from] TupleError),

    /// Operand types are incompatible.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: FieldType,
        found: FieldType,
    },

    /// Integer overflow.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Division by zero in arithmetic expression.
    #[error("division by zero")]
    DivisionByZero,

    /// A postfix expression has the wrong number of operands.
    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    /// Two schemas that must line up column-for-column do not.
    #[error("incompatible schemas: {left} and {right}")]
    IncompatibleSchemas { left: String, right: String },

    /// Unsupported operation or feature.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Catalog error during relation lookup or creation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Block transfer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
