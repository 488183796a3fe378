//! Sorting on one column.
//!
//! A relation whose blocks all fit in the free pool slots is loaded and
//! sorted in place ([`Sorted::Resident`]). Larger relations go through the
//! two-pass external path in [`external`](super::external) and come back as
//! a temporary relation ([`Sorted::Relation`]).

use std::sync::Arc;

use tracing::debug;

use super::context::ExecContext;
use super::error::ExecutorError;
use super::external::{self, Placement, RunOrder, Sorted, load_resident};
use super::scan::TupleSink;
use super::temp::TempScope;
use crate::catalog::Schema;
use crate::storage::{MemoryPool, Relation, SlotId, Storage, StorageError};

/// Sorts the tuples held in `slots` on `column`, in place.
///
/// The slots are treated as one array in slot order. Each block keeps its
/// tuple count; tombstoned tuples sort after all live ones. The sort is
/// stable.
///
/// # Errors
///
/// Returns `ExecutorError::Schema` if `column` is not in the blocks' schema.
pub fn sort_resident(pool: &MemoryPool, slots: &[SlotId], column: &str) -> Result<(), ExecutorError> {
    let Some(schema) = bound_schema(pool, slots) else {
        return Ok(());
    };
    sort_blocks(pool, slots, schema.offset_of(column)?)
}

/// Returns the schema of the first bound block among `slots`.
pub(crate) fn bound_schema(pool: &MemoryPool, slots: &[SlotId]) -> Option<Arc<Schema>> {
    slots.iter().find_map(|&slot| pool.block(slot).schema().cloned())
}

pub(crate) fn sort_blocks(pool: &MemoryPool, slots: &[SlotId], key: usize) -> Result<(), ExecutorError> {
    let mut lengths = Vec::with_capacity(slots.len());
    let mut tuples = Vec::new();
    for &slot in slots {
        let mut block = pool.block(slot);
        lengths.push(block.len());
        tuples.extend(block.take_tuples());
    }

    tuples.sort_by(|a, b| {
        a.is_tombstone()
            .cmp(&b.is_tombstone())
            .then_with(|| a.field(key).cmp(&b.field(key)))
    });

    let mut tuples = tuples.into_iter();
    for (&slot, &len) in slots.iter().zip(&lengths) {
        let mut block = pool.block(slot);
        for tuple in tuples.by_ref().take(len) {
            block
                .try_append(tuple)
                .map_err(|_| StorageError::BlockOverflow {
                    tuples: len,
                    capacity: block.capacity(),
                })?;
        }
    }
    Ok(())
}

/// Sorts `relation` on `column`.
///
/// The result is resident when the relation fits in the free slots, and a
/// temporary owned by `scope` otherwise.
///
/// # Errors
///
/// - `ExecutorError::Schema` if `column` does not exist
/// - `ExecutorError::ResourceExhausted` if two passes are not enough, that is
///   when the number of runs plus the output slot exceeds the free slots
pub fn sort<'e, S: Storage>(
    ctx: &ExecContext<'e, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
) -> Result<Sorted<'e, S>, ExecutorError> {
    let key = relation.schema().offset_of(column)?;
    if let Some(lease) = load_resident(ctx, relation)? {
        debug!(relation = relation.name(), column, blocks = lease.len(), "sorting in memory");
        sort_blocks(ctx.pool(), lease.slots(), key)?;
        return Ok(Placement::Resident(lease));
    }

    debug!(relation = relation.name(), column, "sorting with two passes");
    external::merge_to_relation(ctx, scope, relation, key, RunOrder::Sort).map(Placement::Relation)
}

/// Sorts `relation` into a temporary relation, whichever path is taken.
pub fn sort_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
) -> Result<Relation<S>, ExecutorError> {
    sort(ctx, scope, relation, column)?.into_relation(
        scope,
        RunOrder::Sort.prefix(),
        relation.schema(),
    )
}

/// Streams `relation` in `column` order into `sink`.
///
/// The two-pass path needs no output slot here, so it handles one more run
/// than [`sort`].
pub fn sort_into<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let key = relation.schema().offset_of(column)?;
    if let Some(lease) = load_resident(ctx, relation)? {
        debug!(relation = relation.name(), column, blocks = lease.len(), "sorting in memory");
        sort_blocks(ctx.pool(), lease.slots(), key)?;
        return Placement::<S>::Resident(lease).for_each(ctx, sink);
    }

    debug!(relation = relation.name(), column, "sorting with two passes");
    external::merge_into(ctx, scope, relation, key, RunOrder::Sort, sink)
}
