//! File-backed storage implementation.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{Storage, check_buffer};
use crate::storage::error::StorageError;

const EXTENSION: &str = "blk";

/// File-backed storage implementation.
///
/// Stores each block file as its own disk file under a directory. Blocks are
/// contiguous fixed-size chunks:
///
/// ```text
/// <dir>/<name>.blk
/// +------------------+------------------+------------------+
/// | Block 0          | Block 1          | Block 2          | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ block_size       ^ 2 * block_size
/// ```
///
/// Names are escaped so that temporary names such as `#sort_3` map to valid
/// file names.
///
/// # Concurrency
///
/// Open handles are cached in a `parking_lot::Mutex`; every I/O call holds the
/// lock for its seek + read/write pair.
///
/// NOTE: Nothing is fsync'd. Durability across crashes is not a goal of this
/// storage; dropping the storage flushes the OS buffers as usual.
pub struct FileStorage {
    dir: PathBuf,
    block_size: usize,
    handles: Mutex<HashMap<String, File>>,
}

impl FileStorage {
    /// Opens a storage directory, creating it if needed.
    ///
    /// Existing block files are not scanned up front; each is validated when
    /// first opened.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>, block_size: usize) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            block_size,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, file: &str) -> PathBuf {
        let mut escaped = String::with_capacity(file.len());
        for c in file.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                escaped.push(c);
            } else {
                escaped.push_str(&format!("%{:02x}", c as u32));
            }
        }
        self.dir.join(format!("{}.{}", escaped, EXTENSION))
    }

    /// Runs `f` with an open handle for `file`, opening it on first use.
    fn with_handle<T>(
        &self,
        file: &str,
        f: impl FnOnce(&mut File) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut handles = self.handles.lock();
        if !handles.contains_key(file) {
            let handle = OpenOptions::new()
                .read(true)
                .write(true)
                .open(self.path_of(file))
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => StorageError::FileNotFound(file.to_string()),
                    _ => StorageError::Io(e),
                })?;
            handles.insert(file.to_string(), handle);
        }
        match handles.get_mut(file) {
            Some(handle) => f(handle),
            None => Err(StorageError::FileNotFound(file.to_string())),
        }
    }

    fn count_blocks(&self, file: &str, handle: &File) -> Result<usize, StorageError> {
        let len = handle.metadata()?.len();
        let block_size = self.block_size as u64;
        if len % block_size != 0 {
            return Err(StorageError::Corrupted(format!(
                "file \"{}\" size {} is not a multiple of block size {}",
                file, len, self.block_size
            )));
        }
        Ok((len / block_size) as usize)
    }

    fn offset_of(&self, index: usize) -> u64 {
        index as u64 * self.block_size as u64
    }
}

impl Storage for FileStorage {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn create(&self, file: &str) -> Result<(), StorageError> {
        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.path_of(file))
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::FileExists(file.to_string()),
                _ => StorageError::Io(e),
            })?;
        self.handles.lock().insert(file.to_string(), handle);
        Ok(())
    }

    fn remove(&self, file: &str) -> Result<(), StorageError> {
        self.handles.lock().remove(file);
        fs::remove_file(self.path_of(file)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::FileNotFound(file.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn exists(&self, file: &str) -> bool {
        self.handles.lock().contains_key(file) || self.path_of(file).is_file()
    }

    fn block_count(&self, file: &str) -> Result<usize, StorageError> {
        self.with_handle(file, |handle| self.count_blocks(file, handle))
    }

    fn read_block(&self, file: &str, index: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer(self.block_size, buf.len())?;

        self.with_handle(file, |handle| {
            let count = self.count_blocks(file, handle)?;
            if index >= count {
                return Err(StorageError::BlockOutOfRange {
                    file: file.to_string(),
                    index,
                    count,
                });
            }
            handle.seek(SeekFrom::Start(self.offset_of(index)))?;
            handle.read_exact(buf)?;
            Ok(())
        })
    }

    fn write_block(&self, file: &str, index: usize, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer(self.block_size, buf.len())?;

        self.with_handle(file, |handle| {
            let count = self.count_blocks(file, handle)?;
            if index > count {
                return Err(StorageError::BlockOutOfRange {
                    file: file.to_string(),
                    index,
                    count,
                });
            }
            handle.seek(SeekFrom::Start(self.offset_of(index)))?;
            handle.write_all(buf)?;
            Ok(())
        })
    }

    fn truncate(&self, file: &str, len: usize) -> Result<(), StorageError> {
        self.with_handle(file, |handle| {
            let count = self.count_blocks(file, handle)?;
            if len < count {
                handle.set_len(self.offset_of(len))?;
            }
            Ok(())
        })
    }
}
