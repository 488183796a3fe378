//! RAII leases over pool slots.

use std::fmt;

use parking_lot::MutexGuard;

use super::{MemoryPool, SlotId};
use crate::storage::block::Block;

/// A set of checked-out pool slots, released when dropped.
///
/// Algorithms hold their working memory as leases so that every exit path,
/// including `?` returns, gives the slots back. Positions within the lease
/// (`0..len()`) are distinct from the pool's slot ids.
pub struct SlotLease<'p> {
    pool: &'p MemoryPool,
    slots: Vec<SlotId>,
}

impl<'p> SlotLease<'p> {
    pub(super) fn new(pool: &'p MemoryPool, slots: Vec<SlotId>) -> Self {
        Self { pool, slots }
    }

    /// Returns the number of leased slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the lease holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the leased slot ids.
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// Returns the pool the slots belong to.
    pub fn pool(&self) -> &'p MemoryPool {
        self.pool
    }

    /// Locks the block at lease position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn block(&self, i: usize) -> MutexGuard<'p, Block> {
        self.pool.block(self.slots[i])
    }

    /// Moves the slots from position `at` onwards into a new lease.
    ///
    /// # Panics
    ///
    /// Panics if `at > len()`.
    pub fn split_off(&mut self, at: usize) -> SlotLease<'p> {
        SlotLease::new(self.pool, self.slots.split_off(at))
    }

    /// Releases every slot past the first `len`.
    pub fn shrink_to(&mut self, len: usize) {
        if len < self.slots.len() {
            for slot in self.slots.split_off(len) {
                self.pool.release(slot);
            }
        }
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        for &slot in &self.slots {
            self.pool.release(slot);
        }
    }
}

impl fmt::Debug for SlotLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLease").field("slots", &self.slots).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_releases() {
        let pool = MemoryPool::new(4);
        {
            let lease = pool.lease_all();
            assert_eq!(lease.len(), 4);
            assert_eq!(pool.free_count(), 0);
        }
        assert_eq!(pool.free_count(), 4);
        let stats = pool.stats();
        assert_eq!(stats.checkouts, stats.releases);
    }

    #[test]
    fn test_split_off() {
        let pool = MemoryPool::new(4);
        let mut lease = pool.lease_n(3).unwrap();
        let tail = lease.split_off(1);
        assert_eq!(lease.slots(), &[0]);
        assert_eq!(tail.slots(), &[1, 2]);

        drop(tail);
        assert_eq!(pool.free_count(), 3);
        drop(lease);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn test_shrink_to() {
        let pool = MemoryPool::new(4);
        let mut lease = pool.lease_all();
        lease.shrink_to(1);
        assert_eq!(lease.len(), 1);
        assert_eq!(pool.free_count(), 3);
        lease.shrink_to(5);
        assert_eq!(lease.len(), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        fn fails(pool: &MemoryPool) -> Result<(), crate::storage::PoolError> {
            let _a = pool.lease()?;
            let _b = pool.lease_n(10)?;
            Ok(())
        }

        let pool = MemoryPool::new(2);
        assert!(fails(&pool).is_err());
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.stats().in_use, 0);
    }
}
