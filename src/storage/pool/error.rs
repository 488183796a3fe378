//! Memory pool errors.

/// Memory pool errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Not enough free slots for the request.
    ///
    /// The pool never waits for slots to come back; callers either fall back
    /// to a smaller working set or fail the operation. Slots already leased
    /// by the failing operation are released by their [`SlotLease`] drops.
    ///
    /// [`SlotLease`]: super::SlotLease
    #[error("memory pool exhausted: requested {requested} slots, {available} free")]
    Exhausted { requested: usize, available: usize },
}
