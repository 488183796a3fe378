//! Storage layer errors.

use crate::tuple::TupleError;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Block file not found in storage.
    ///
    /// This occurs when reading or writing a relation whose file was never
    /// created or has already been removed.
    #[error("block file not found: {0}")]
    FileNotFound(String),

    /// A block file with this name already exists.
    #[error("block file already exists: {0}")]
    FileExists(String),

    /// Block index past the end of the file.
    ///
    /// Reads must address an existing block; writes may address the next
    /// index to extend the file by one block.
    #[error("block {index} out of range for \"{file}\" with {count} blocks")]
    BlockOutOfRange {
        file: String,
        index: usize,
        count: usize,
    },

    /// Invalid buffer size provided to read_block or write_block.
    ///
    /// Buffers must be exactly the storage block size.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size (block size)
        expected: usize,
        /// Actual buffer size provided
        actual: usize,
    },

    /// Tuple index past the end of a block.
    #[error("tuple index {index} out of range for block with {len} tuples")]
    TupleIndexOutOfRange { index: usize, len: usize },

    /// A block does not have room for the tuples being written into it.
    #[error("block overflow: {tuples} tuples exceed capacity {capacity}")]
    BlockOverflow { tuples: usize, capacity: usize },

    /// I/O error from underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data corruption detected.
    ///
    /// This indicates that a block file has an invalid size or a block
    /// slot could not be decoded.
    #[error("data corruption: {0}")]
    Corrupted(String),
}

impl From<TupleError> for StorageError {
    fn from(e: TupleError) -> Self {
        StorageError::Corrupted(e.to_string())
    }
}
