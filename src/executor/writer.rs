//! Buffered tuple output into a relation.

use tracing::trace;

use super::error::ExecutorError;
use crate::storage::{Relation, SlotLease, Storage, StorageError};
use crate::tuple::Tuple;

/// Appends tuples to a relation through one leased pool slot.
///
/// Tuples accumulate in the slot's block; a full block is written out and the
/// slot reused. [`finish`](Self::finish) flushes the final partial block.
/// Dropping a writer without finishing discards the buffered tuples, so a
/// failed operation leaves only complete blocks behind.
pub(crate) struct BlockWriter<'p, S: Storage> {
    relation: Relation<S>,
    lease: SlotLease<'p>,
    next_index: usize,
    written: usize,
}

impl<'p, S: Storage> BlockWriter<'p, S> {
    /// Starts writing at block 0 of an empty relation.
    pub(crate) fn new(relation: Relation<S>, lease: SlotLease<'p>) -> Self {
        debug_assert!(!lease.is_empty(), "writer needs one slot");
        relation.bind(&mut lease.block(0));
        Self {
            relation,
            lease,
            next_index: 0,
            written: 0,
        }
    }

    /// Starts writing after the existing contents of `relation`.
    ///
    /// A partially filled last block is loaded and filled up first.
    pub(crate) fn append_to(relation: Relation<S>, lease: SlotLease<'p>) -> Result<Self, StorageError> {
        let count = relation.block_count()?;
        let mut next_index = count;
        {
            let mut block = lease.block(0);
            relation.bind(&mut block);
            if count > 0 {
                relation.read_block(count - 1, &mut block)?;
                if block.is_full() {
                    relation.bind(&mut block);
                } else {
                    next_index = count - 1;
                }
            }
        }
        Ok(Self {
            relation,
            lease,
            next_index,
            written: 0,
        })
    }

    /// Appends one tuple, flushing the buffer first if it is full.
    pub(crate) fn push(&mut self, tuple: Tuple) -> Result<(), ExecutorError> {
        let mut block = self.lease.block(0);
        if block.is_full() {
            self.relation.write_block(self.next_index, &block)?;
            trace!(relation = self.relation.name(), block = self.next_index, "flushed block");
            self.next_index += 1;
            block.clear();
        }
        block
            .try_append(tuple)
            .map_err(|_| StorageError::BlockOverflow {
                tuples: block.len() + 1,
                capacity: block.capacity(),
            })?;
        self.written += 1;
        Ok(())
    }

    /// Returns the number of tuples pushed so far.
    pub(crate) fn written(&self) -> usize {
        self.written
    }

    /// Flushes the last partial block and returns the relation.
    pub(crate) fn finish(self) -> Result<Relation<S>, ExecutorError> {
        {
            let block = self.lease.block(0);
            if !block.is_empty() {
                self.relation.write_block(self.next_index, &block)?;
                trace!(relation = self.relation.name(), block = self.next_index, "flushed final block");
            }
        }
        Ok(self.relation)
    }
}
