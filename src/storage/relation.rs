//! Schema-bound block sequences on backing storage.

use std::fmt;
use std::sync::Arc;

use super::block::Block;
use super::error::StorageError;
use super::io::Storage;
use crate::catalog::Schema;
use crate::tuple::{SLOT_EMPTY, SLOT_LIVE};

/// A named, schema-bound, ordered sequence of blocks.
///
/// A `Relation` is a cheap handle: it holds the name, the shared schema and
/// the backing storage. Blocks move between storage and pool slots through
/// [`read_block`](Self::read_block) and [`write_block`](Self::write_block).
///
/// Relations are created and deleted through the
/// [`Catalog`](crate::catalog::Catalog).
pub struct Relation<S: Storage> {
    name: String,
    schema: Arc<Schema>,
    capacity: usize,
    storage: Arc<S>,
}

impl<S: Storage> Relation<S> {
    /// Creates a handle for an existing block file.
    pub(crate) fn new(name: impl Into<String>, schema: Arc<Schema>, storage: Arc<S>) -> Self {
        let capacity = schema.block_capacity(storage.block_size());
        Self {
            name: name.into(),
            schema,
            capacity,
            storage,
        }
    }

    /// Returns the relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relation schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns how many tuples fit in one block.
    pub fn tuples_per_block(&self) -> usize {
        self.capacity
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> Result<usize, StorageError> {
        self.storage.block_count(&self.name)
    }

    /// Returns the number of live tuples across all blocks.
    ///
    /// Only slot flag bytes are inspected; no tuple is decoded and no pool
    /// slot is used.
    pub fn tuple_count(&self) -> Result<usize, StorageError> {
        let width = self.schema.tuple_width();
        let mut buf = vec![0u8; self.storage.block_size()];
        let mut total = 0;
        for index in 0..self.block_count()? {
            self.storage.read_block(&self.name, index, &mut buf)?;
            total += buf
                .chunks_exact(width)
                .take(self.capacity)
                .map(|slot| slot[0])
                .take_while(|&flag| flag != SLOT_EMPTY)
                .filter(|&flag| flag == SLOT_LIVE)
                .count();
        }
        Ok(total)
    }

    /// Empties `block` and binds it to this relation's schema and capacity.
    pub fn bind(&self, block: &mut Block) {
        block.reset(self.schema.clone(), self.capacity);
    }

    /// Fetches block `index` into `block`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlockOutOfRange` if the block does not exist, or
    /// `StorageError::Corrupted` if it cannot be decoded.
    pub fn read_block(&self, index: usize, block: &mut Block) -> Result<(), StorageError> {
        let mut buf = vec![0u8; self.storage.block_size()];
        self.storage.read_block(&self.name, index, &mut buf)?;
        block.decode_into(self.schema.clone(), self.capacity, &buf)
    }

    /// Stores `block` as block `index`, extending the relation when `index`
    /// equals the block count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlockOverflow` if `block` holds more tuples than
    /// this relation's capacity, or `StorageError::BlockOutOfRange` if `index`
    /// is past the end.
    pub fn write_block(&self, index: usize, block: &Block) -> Result<(), StorageError> {
        if block.len() > self.capacity {
            return Err(StorageError::BlockOverflow {
                tuples: block.len(),
                capacity: self.capacity,
            });
        }
        debug_assert!(
            block
                .schema()
                .is_none_or(|s| s.is_type_compatible(&self.schema)),
            "block schema does not match relation \"{}\"",
            self.name
        );

        let mut buf = vec![0u8; self.storage.block_size()];
        block.encode(&mut buf)?;
        self.storage.write_block(&self.name, index, &buf)
    }

    /// Appends `block` after the last block and returns its index.
    pub fn append_block(&self, block: &Block) -> Result<usize, StorageError> {
        let index = self.block_count()?;
        self.write_block(index, block)?;
        Ok(index)
    }

    /// Keeps only the first `len` blocks.
    pub fn truncate(&self, len: usize) -> Result<(), StorageError> {
        self.storage.truncate(&self.name, len)
    }
}

// Manual impl: `S` itself need not be `Clone`.
impl<S: Storage> Clone for Relation<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            schema: self.schema.clone(),
            capacity: self.capacity,
            storage: self.storage.clone(),
        }
    }
}

impl<S: Storage> fmt::Debug for Relation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Field, FieldType};
    use crate::storage::MemoryStorage;
    use crate::tuple::Tuple;

    fn relation(block_size: usize) -> Relation<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new(block_size));
        storage.create("r").unwrap();
        let schema = Arc::new(Schema::from_pairs([("id", FieldType::Integer)]).unwrap());
        Relation::new("r", schema, storage)
    }

    fn fill(rel: &Relation<MemoryStorage>, ids: &[i64]) -> Block {
        let mut block = Block::default();
        rel.bind(&mut block);
        for &id in ids {
            block.try_append(Tuple::from_fields(vec![Field::Int(id)])).unwrap();
        }
        block
    }

    #[test]
    fn test_capacity_from_block_size() {
        // 9-byte tuples
        assert_eq!(relation(27).tuples_per_block(), 3);
        assert_eq!(relation(26).tuples_per_block(), 2);
        assert_eq!(relation(29).tuples_per_block(), 3);
    }

    #[test]
    fn test_write_read_and_count() {
        let rel = relation(29);
        rel.append_block(&fill(&rel, &[1, 2, 3])).unwrap();
        let mut second = fill(&rel, &[4, 5]);
        second.tombstone(0);
        rel.append_block(&second).unwrap();

        assert_eq!(rel.block_count().unwrap(), 2);
        assert_eq!(rel.tuple_count().unwrap(), 4);

        let mut block = Block::default();
        rel.read_block(1, &mut block).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.live_count(), 1);
    }

    #[test]
    fn test_write_overflow() {
        let rel = relation(29);
        let mut block = Block::new(rel.schema().clone(), 10);
        for i in 0..4 {
            block.try_append(Tuple::from_fields(vec![Field::Int(i)])).unwrap();
        }
        assert!(matches!(
            rel.write_block(0, &block),
            Err(StorageError::BlockOverflow { tuples: 4, capacity: 3 })
        ));
    }

    #[test]
    fn test_truncate() {
        let rel = relation(29);
        for _ in 0..3 {
            rel.append_block(&fill(&rel, &[1])).unwrap();
        }
        rel.truncate(1).unwrap();
        assert_eq!(rel.block_count().unwrap(), 1);
        assert_eq!(rel.tuple_count().unwrap(), 1);
    }
}
