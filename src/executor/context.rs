//! Execution context for query algorithms.
//!
//! [`ExecContext`] bundles the two shared resources every algorithm
//! consumes: the relation catalog and the memory pool. It is `Copy`, so
//! algorithms take it by reference and pass it down freely.

use crate::catalog::Catalog;
use crate::storage::{MemoryPool, Storage};

/// Catalog and memory pool shared by the algorithms of one statement.
pub struct ExecContext<'e, S: Storage> {
    catalog: &'e Catalog<S>,
    pool: &'e MemoryPool,
}

// Manual impls: `S` itself need not be `Clone`.
impl<S: Storage> Clone for ExecContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Storage> Copy for ExecContext<'_, S> {}

impl<'e, S: Storage> ExecContext<'e, S> {
    /// Creates a context over a catalog and a pool.
    pub fn new(catalog: &'e Catalog<S>, pool: &'e MemoryPool) -> Self {
        Self { catalog, pool }
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &'e Catalog<S> {
        self.catalog
    }

    /// Returns the memory pool.
    pub fn pool(&self) -> &'e MemoryPool {
        self.pool
    }
}
