//! Engine-level errors.

use crate::catalog::{CatalogError, SchemaError};
use crate::executor::ExecutorError;
use crate::storage::StorageError;

/// Errors that can occur during engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// The configuration cannot run.
    InvalidConfig(String),
    /// Catalog error from DDL.
    Catalog(CatalogError),
    /// Executor error from a statement.
    Executor(ExecutorError),
    /// Storage error outside any statement.
    Storage(StorageError),
}

/// Broad failure classes of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The memory pool could not supply enough slots.
    ResourceExhausted,
    /// Unknown or ambiguous column, or a tuple of the wrong shape.
    SchemaMismatch,
    /// Incompatible operand types.
    TypeMismatch,
    /// A relation is not in the catalog.
    NotFound,
    /// Anything else.
    Other,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            EngineError::Catalog(e) => write!(f, "{}", e),
            EngineError::Executor(e) => write!(f, "{}", e),
            EngineError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Catalog(e) => Some(e),
            EngineError::Executor(e) => Some(e),
            EngineError::Storage(e) => Some(e),
            EngineError::InvalidConfig(_) => None,
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        EngineError::Catalog(e)
    }
}

impl From<ExecutorError> for EngineError {
    fn from(e: ExecutorError) -> Self {
        EngineError::Executor(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl EngineError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Catalog(e) => catalog_kind(e),
            EngineError::Executor(e) => match e {
                ExecutorError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
                ExecutorError::Schema(_)
                | ExecutorError::Tuple(_)
                | ExecutorError::IncompatibleSchemas { .. } => ErrorKind::SchemaMismatch,
                ExecutorError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
                ExecutorError::Catalog(e) => catalog_kind(e),
                _ => ErrorKind::Other,
            },
            EngineError::InvalidConfig(_) | EngineError::Storage(_) => ErrorKind::Other,
        }
    }
}

fn catalog_kind(e: &CatalogError) -> ErrorKind {
    match e {
        CatalogError::RelationNotFound { .. } => ErrorKind::NotFound,
        CatalogError::Schema(SchemaError::ColumnNotFound { .. } | SchemaError::AmbiguousColumn { .. }) => {
            ErrorKind::SchemaMismatch
        }
        _ => ErrorKind::Other,
    }
}
