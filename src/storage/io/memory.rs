//! In-memory block storage implementation.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{Storage, check_buffer};
use crate::storage::error::StorageError;

/// In-memory block storage for testing and development.
///
/// Each block file is a `Vec` of boxed block buffers; block indices are `Vec`
/// indices. Contents are lost when the storage is dropped.
pub struct MemoryStorage {
    block_size: usize,
    files: Mutex<HashMap<String, Vec<Box<[u8]>>>>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage with the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of block files.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

impl Storage for MemoryStorage {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn create(&self, file: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock();
        if files.contains_key(file) {
            return Err(StorageError::FileExists(file.to_string()));
        }
        files.insert(file.to_string(), Vec::new());
        Ok(())
    }

    fn remove(&self, file: &str) -> Result<(), StorageError> {
        self.files
            .lock()
            .remove(file)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(file.to_string()))
    }

    fn exists(&self, file: &str) -> bool {
        self.files.lock().contains_key(file)
    }

    fn block_count(&self, file: &str) -> Result<usize, StorageError> {
        self.files
            .lock()
            .get(file)
            .map(Vec::len)
            .ok_or_else(|| StorageError::FileNotFound(file.to_string()))
    }

    fn read_block(&self, file: &str, index: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer(self.block_size, buf.len())?;

        let files = self.files.lock();
        let blocks = files
            .get(file)
            .ok_or_else(|| StorageError::FileNotFound(file.to_string()))?;
        let block = blocks.get(index).ok_or_else(|| StorageError::BlockOutOfRange {
            file: file.to_string(),
            index,
            count: blocks.len(),
        })?;

        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&self, file: &str, index: usize, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer(self.block_size, buf.len())?;

        let mut files = self.files.lock();
        let blocks = files
            .get_mut(file)
            .ok_or_else(|| StorageError::FileNotFound(file.to_string()))?;

        match index.cmp(&blocks.len()) {
            std::cmp::Ordering::Less => blocks[index].copy_from_slice(buf),
            std::cmp::Ordering::Equal => blocks.push(buf.into()),
            std::cmp::Ordering::Greater => {
                return Err(StorageError::BlockOutOfRange {
                    file: file.to_string(),
                    index,
                    count: blocks.len(),
                });
            }
        }
        Ok(())
    }

    fn truncate(&self, file: &str, len: usize) -> Result<(), StorageError> {
        let mut files = self.files.lock();
        let blocks = files
            .get_mut(file)
            .ok_or_else(|| StorageError::FileNotFound(file.to_string()))?;
        blocks.truncate(len);
        Ok(())
    }
}
