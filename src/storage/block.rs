//! Fixed-capacity tuple blocks.

use std::sync::Arc;

use super::error::StorageError;
use crate::catalog::Schema;
use crate::tuple::{SLOT_EMPTY, Tuple};

/// A fixed-capacity ordered collection of tuples sharing one schema.
///
/// Blocks are the contents of memory pool slots. A slot's block is rebound to
/// a relation's schema with [`Block::reset`] (or filled by
/// [`Relation::read_block`](super::Relation::read_block)) before use.
///
/// Tombstoned tuples keep their position; [`Block::compact`] removes them.
#[derive(Debug, Default)]
pub struct Block {
    schema: Option<Arc<Schema>>,
    capacity: usize,
    tuples: Vec<Tuple>,
}

impl Block {
    /// Creates an empty block bound to `schema`.
    pub fn new(schema: Arc<Schema>, capacity: usize) -> Self {
        Self {
            schema: Some(schema),
            capacity,
            tuples: Vec::with_capacity(capacity),
        }
    }

    /// Empties the block and binds it to `schema` with the given capacity.
    pub fn reset(&mut self, schema: Arc<Schema>, capacity: usize) {
        self.tuples.clear();
        self.schema = Some(schema);
        self.capacity = capacity;
    }

    /// Returns the schema the block is bound to, if any.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Returns the maximum number of tuples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of tuples, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Returns true if the block holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Returns true if no more tuples can be appended.
    pub fn is_full(&self) -> bool {
        self.tuples.len() >= self.capacity
    }

    /// Appends a tuple, handing it back if the block is full.
    pub fn try_append(&mut self, tuple: Tuple) -> Result<(), Tuple> {
        if self.is_full() {
            return Err(tuple);
        }
        self.tuples.push(tuple);
        Ok(())
    }

    /// Returns the tuple at `index`.
    pub fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }

    /// Returns the tuple at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tuple> {
        self.tuples.get_mut(index)
    }

    /// Replaces the tuple at `index`, returning the previous one.
    ///
    /// The slot may hold a tombstoned tuple.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TupleIndexOutOfRange` if `index >= len()`.
    pub fn set(&mut self, index: usize, tuple: Tuple) -> Result<Tuple, StorageError> {
        let len = self.tuples.len();
        match self.tuples.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, tuple)),
            None => Err(StorageError::TupleIndexOutOfRange { index, len }),
        }
    }

    /// Marks the tuple at `index` deleted. Returns false if out of range.
    pub fn tombstone(&mut self, index: usize) -> bool {
        match self.tuples.get_mut(index) {
            Some(tuple) => {
                tuple.mark_tombstone();
                true
            }
            None => false,
        }
    }

    /// Iterates over all tuples, tombstoned ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }

    /// Iterates over tuples that are not tombstoned.
    pub fn live(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter(|t| !t.is_tombstone())
    }

    /// Returns the number of tuples that are not tombstoned.
    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Removes and returns all tuples, leaving the block empty but bound.
    pub fn take_tuples(&mut self) -> Vec<Tuple> {
        std::mem::take(&mut self.tuples)
    }

    /// Empties the block.
    pub fn clear(&mut self) {
        self.tuples.clear();
    }

    /// Drops tombstoned tuples, keeping the order of the rest.
    ///
    /// Returns the number of tuples removed.
    pub fn compact(&mut self) -> usize {
        let before = self.tuples.len();
        self.tuples.retain(|t| !t.is_tombstone());
        before - self.tuples.len()
    }

    /// Encodes the block into `buf`.
    ///
    /// Layout: each tuple's fixed-width record in order, then zeros up to
    /// `buf.len()`. The zeroed slots read back as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlockOverflow` if the tuples do not fit in
    /// `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), StorageError> {
        let width = self.schema.as_ref().map_or(0, |s| s.tuple_width());
        if width * self.tuples.len() > buf.len() {
            return Err(StorageError::BlockOverflow {
                tuples: self.tuples.len(),
                capacity: self.capacity,
            });
        }

        let mut out = &mut buf[..];
        if let Some(schema) = &self.schema {
            for tuple in &self.tuples {
                tuple.encode(schema, &mut out);
            }
        }
        out.fill(0);
        Ok(())
    }

    /// Replaces the block's contents with the tuples encoded in `buf`.
    ///
    /// Slots are read in order up to `capacity`; the first empty slot ends
    /// the block.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if `buf` is shorter than `capacity`
    /// slots or a slot cannot be decoded.
    pub fn decode_into(
        &mut self,
        schema: Arc<Schema>,
        capacity: usize,
        buf: &[u8],
    ) -> Result<(), StorageError> {
        let width = schema.tuple_width();
        if width * capacity > buf.len() {
            return Err(StorageError::Corrupted(format!(
                "block of {} bytes cannot hold {} tuples of {} bytes",
                buf.len(),
                capacity,
                width
            )));
        }
        self.reset(schema, capacity);

        let Some(schema) = &self.schema else {
            return Ok(());
        };
        let mut input = buf;
        for _ in 0..capacity {
            if input.first() == Some(&SLOT_EMPTY) {
                break;
            }
            self.tuples.push(Tuple::decode(schema, &mut input)?);
        }
        Ok(())
    }
}
