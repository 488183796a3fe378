//! Block I/O backend implementations.
//!
//! This module provides the `Storage` trait for block-based I/O operations,
//! along with MemoryStorage and FileStorage implementations.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::storage::error::StorageError;

/// Block I/O backend trait.
///
/// Storage holds one *block file* per relation: an ordered sequence of
/// fixed-size blocks addressed by index. It reads and writes raw bytes into
/// caller-owned buffers and knows nothing about tuples or schemas.
///
/// Implementations include:
/// - `io::MemoryStorage`: in-memory block files
/// - `io::FileStorage`: one disk file per relation under a directory
///
/// # Design Decisions
///
/// 1. **Synchronous**: every call runs to completion; the engine has no
///    suspension points.
///
/// 2. **Caller-owned buffers**: memory management belongs to the caller
///    (the memory pool and the relation layer).
///
/// 3. **Append by index**: writing block `n` where `n == block_count` extends
///    the file; writing further ahead is an error, so files never have holes.
///
/// 4. **No caching**: caching is the memory pool's job.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`.
pub trait Storage: Send + Sync {
    /// Returns the size in bytes of every block.
    fn block_size(&self) -> usize;

    /// Creates an empty block file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileExists` if the file already exists.
    fn create(&self, file: &str) -> Result<(), StorageError>;

    /// Removes a block file and all its blocks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if the file does not exist.
    fn remove(&self, file: &str) -> Result<(), StorageError>;

    /// Returns true if the block file exists.
    fn exists(&self, file: &str) -> bool;

    /// Returns the number of blocks in the file.
    fn block_count(&self, file: &str) -> Result<usize, StorageError>;

    /// Reads block `index` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlockOutOfRange` if the block does not exist and
    /// `StorageError::InvalidBufferSize` if `buf.len() != block_size()`.
    fn read_block(&self, file: &str, index: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Writes `buf` as block `index`, extending the file when `index` is the
    /// next block.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlockOutOfRange` if `index > block_count` and
    /// `StorageError::InvalidBufferSize` if `buf.len() != block_size()`.
    fn write_block(&self, file: &str, index: usize, buf: &[u8]) -> Result<(), StorageError>;

    /// Truncates the file to its first `len` blocks.
    ///
    /// Truncating to a length at or past the end is a no-op.
    fn truncate(&self, file: &str, len: usize) -> Result<(), StorageError>;
}

pub(crate) fn check_buffer(expected: usize, actual: usize) -> Result<(), StorageError> {
    if expected != actual {
        return Err(StorageError::InvalidBufferSize { expected, actual });
    }
    Ok(())
}
