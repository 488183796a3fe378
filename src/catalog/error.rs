//! Catalog-specific errors.

use crate::storage::StorageError;

/// Errors from schema construction and column resolution.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema must have at least one column.
    #[error("schema has no columns")]
    Empty,

    /// Two columns share the same name.
    #[error("column \"{name}\" is defined more than once")]
    DuplicateColumn { name: String },

    /// Referenced column does not exist.
    #[error("column \"{name}\" does not exist")]
    ColumnNotFound { name: String },

    /// Column reference is ambiguous (matches multiple columns).
    #[error("column reference \"{name}\" is ambiguous")]
    AmbiguousColumn { name: String },
}

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Relation already exists.
    #[error("relation \"{name}\" already exists")]
    RelationExists { name: String },

    /// Referenced relation does not exist.
    #[error("relation \"{name}\" does not exist")]
    RelationNotFound { name: String },

    /// Relation name is empty or uses the reserved temporary prefix.
    #[error("invalid relation name \"{name}\"")]
    InvalidName { name: String },

    /// A single tuple of the schema does not fit into one block.
    #[error("tuple width {tuple_width} exceeds block size {block_size}")]
    TupleTooWide {
        tuple_width: usize,
        block_size: usize,
    },

    /// Invalid schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Underlying storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
