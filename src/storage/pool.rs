//! Fixed-size memory pool of block slots.
//!
//! The pool is the only memory budget query algorithms may use for blocks.
//! It owns `N` [`Block`] slots for the lifetime of the engine; algorithms
//! check slots out, fill them from relations, and give them back.
//!
//! # Components
//!
//! - [`MemoryPool`]: slot allocator plus the slot blocks themselves
//! - [`SlotLease`]: RAII set of checked-out slots, released on drop
//! - [`PoolStats`]: cumulative checkout/release counters
//!
//! # Example
//!
//! ```
//! use blockdb::storage::MemoryPool;
//!
//! let pool = MemoryPool::new(3);
//! {
//!     let lease = pool.lease_n(2)?;
//!     assert_eq!(lease.len(), 2);
//!     assert_eq!(pool.free_count(), 1);
//! }
//! // Slots are returned when the lease is dropped
//! assert_eq!(pool.free_count(), 3);
//! # Ok::<(), blockdb::storage::PoolError>(())
//! ```

mod error;
mod lease;

pub use error::PoolError;
pub use lease::SlotLease;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::block::Block;

/// Index of a pool slot.
pub type SlotId = usize;

/// Cumulative pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots.
    pub capacity: usize,
    /// Slots currently checked out.
    pub in_use: usize,
    /// Checkouts since the pool was created.
    pub checkouts: u64,
    /// Releases since the pool was created.
    pub releases: u64,
}

/// Fixed set of block slots with last-freed-first checkout.
///
/// Each slot is either free or checked out to exactly one holder. Only the
/// holder may touch the slot's block through [`MemoryPool::block`].
///
/// # Latch Hierarchy
///
/// 1. State mutex (free stack, counters)
/// 2. Slot block mutexes
///
/// The state lock is never held while a slot block is locked by the pool
/// itself, and callers never see the state lock.
pub struct MemoryPool {
    slots: Vec<Mutex<Block>>,
    state: Mutex<PoolState>,
}

struct PoolState {
    /// Free slots; the top is handed out next.
    free: Vec<SlotId>,
    /// `is_free[slot]` mirrors membership in `free`.
    is_free: Vec<bool>,
    checkouts: u64,
    releases: u64,
}

impl MemoryPool {
    /// Creates a pool of `capacity` empty slots.
    ///
    /// Slot 0 is handed out first.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be > 0");

        let slots = (0..capacity).map(|_| Mutex::new(Block::default())).collect();
        let state = PoolState {
            free: (0..capacity).rev().collect(),
            is_free: vec![true; capacity],
            checkouts: 0,
            releases: 0,
        };

        Self {
            slots,
            state: Mutex::new(state),
        }
    }

    /// Returns the total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of free slots.
    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Checks out one slot, or returns `None` if every slot is in use.
    pub fn checkout(&self) -> Option<SlotId> {
        let mut state = self.state.lock();
        let slot = state.free.pop()?;
        state.is_free[slot] = false;
        state.checkouts += 1;
        trace!(slot, "checkout");
        Some(slot)
    }

    /// Checks out exactly `k` slots, or none at all.
    pub fn checkout_n(&self, k: usize) -> Option<Vec<SlotId>> {
        let mut state = self.state.lock();
        if state.free.len() < k {
            return None;
        }
        let at = state.free.len() - k;
        let mut slots = state.free.split_off(at);
        slots.reverse();
        for &slot in &slots {
            state.is_free[slot] = false;
        }
        state.checkouts += k as u64;
        trace!(?slots, "checkout_n");
        Some(slots)
    }

    /// Checks out every free slot. The result may be empty.
    pub fn checkout_all(&self) -> Vec<SlotId> {
        let mut state = self.state.lock();
        let mut slots = std::mem::take(&mut state.free);
        slots.reverse();
        for &slot in &slots {
            state.is_free[slot] = false;
        }
        state.checkouts += slots.len() as u64;
        trace!(?slots, "checkout_all");
        slots
    }

    /// Returns a slot to the pool.
    ///
    /// Releasing an out-of-range slot, or one that is already free, is a
    /// no-op.
    pub fn release(&self, slot: SlotId) {
        {
            let mut state = self.state.lock();
            if !state.is_free.get(slot).is_some_and(|free| !free) {
                return;
            }
            state.is_free[slot] = true;
            state.free.push(slot);
            state.releases += 1;
        }

        // Drop tuples eagerly so a free slot holds no memory. Skipped if the
        // former holder still has the block locked.
        if let Some(mut block) = self.slots[slot].try_lock() {
            block.clear();
        }
        trace!(slot, "release");
    }

    /// Locks and returns the block of `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn block(&self, slot: SlotId) -> MutexGuard<'_, Block> {
        self.slots[slot].lock()
    }

    /// Returns the cumulative counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.slots.len(),
            in_use: self.slots.len() - state.free.len(),
            checkouts: state.checkouts,
            releases: state.releases,
        }
    }

    /// Leases one slot.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Exhausted` if no slot is free.
    pub fn lease(&self) -> Result<SlotLease<'_>, PoolError> {
        self.lease_n(1)
    }

    /// Leases exactly `k` slots.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Exhausted` if fewer than `k` slots are free.
    pub fn lease_n(&self, k: usize) -> Result<SlotLease<'_>, PoolError> {
        match self.checkout_n(k) {
            Some(slots) => Ok(SlotLease::new(self, slots)),
            None => Err(PoolError::Exhausted {
                requested: k,
                available: self.free_count(),
            }),
        }
    }

    /// Leases every free slot. The lease may be empty.
    pub fn lease_all(&self) -> SlotLease<'_> {
        SlotLease::new(self, self.checkout_all())
    }
}
