//! Error types for tuple construction and decoding.

use crate::datum::FieldType;

/// Errors from building or decoding a tuple.
#[derive(Debug, thiserror::Error)]
pub enum TupleError {
    /// Number of fields differs from the schema.
    #[error("tuple has {found} fields, schema expects {expected}")]
    ArityMismatch { expected: usize, found: usize },

    /// A field's type differs from its column type.
    #[error("column \"{column}\" expects {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        found: FieldType,
    },

    /// A string is longer than the column allows.
    #[error("value for column \"{column}\" is {len} bytes, limit is {limit}")]
    ValueTooLong {
        column: String,
        len: usize,
        limit: usize,
    },

    /// A string contains a NUL byte.
    #[error("value for column \"{column}\" contains a NUL byte")]
    NulInText { column: String },

    /// Encoded bytes could not be decoded.
    #[error("invalid tuple encoding: {0}")]
    InvalidEncoding(String),
}
