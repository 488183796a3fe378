//! Duplicate elimination.
//!
//! Two tuples are duplicates when every field is equal. The input is ordered
//! on a representative column first, so duplicates are always neighbours
//! within one run of equal representative values; the set of tuples already
//! seen only has to cover that run and is cleared whenever the value changes.

use std::collections::HashSet;

use tracing::debug;

use super::context::ExecContext;
use super::error::ExecutorError;
use super::external::{self, Deduped, Placement, RunOrder, load_resident};
use super::scan::TupleSink;
use super::sort::{bound_schema, sort_blocks};
use super::temp::TempScope;
use crate::datum::Field;
use crate::storage::{MemoryPool, Relation, SlotId, Storage};
use crate::tuple::Tuple;

/// Admits the first copy of each tuple in a stream ordered on `key`.
pub(crate) struct KeyGroupFilter {
    key: usize,
    current: Option<Field>,
    seen: HashSet<String>,
}

impl KeyGroupFilter {
    pub(crate) fn new(key: usize) -> Self {
        Self {
            key,
            current: None,
            seen: HashSet::new(),
        }
    }

    /// Returns false if `tuple` repeats one admitted since the key last
    /// changed.
    pub(crate) fn admit(&mut self, tuple: &Tuple) -> bool {
        let value = tuple.field(self.key);
        if self.current.as_ref() != value {
            self.seen.clear();
            self.current = value.cloned();
        }
        self.seen.insert(tuple.dedup_key())
    }
}

/// Removes duplicates among the tuples held in `slots`, in place.
///
/// The slots are sorted on `column` (see
/// [`sort_resident`](super::sort::sort_resident)) and every repeated tuple is
/// tombstoned. Returns the number of tuples tombstoned.
pub fn dedup_resident(
    pool: &MemoryPool,
    slots: &[SlotId],
    column: &str,
) -> Result<usize, ExecutorError> {
    let Some(schema) = bound_schema(pool, slots) else {
        return Ok(0);
    };
    dedup_blocks(pool, slots, schema.offset_of(column)?)
}

pub(crate) fn dedup_blocks(
    pool: &MemoryPool,
    slots: &[SlotId],
    key: usize,
) -> Result<usize, ExecutorError> {
    sort_blocks(pool, slots, key)?;

    let mut filter = KeyGroupFilter::new(key);
    let mut removed = 0;
    for &slot in slots {
        let mut block = pool.block(slot);
        for offset in 0..block.len() {
            let duplicate = block
                .get(offset)
                .is_some_and(|t| !t.is_tombstone() && !filter.admit(t));
            if duplicate {
                block.tombstone(offset);
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Removes duplicate tuples from `relation`, using `column` as the
/// representative column. The result is ordered on `column`.
///
/// The two-pass path materializes its output and needs one slot per run plus
/// an output slot. With a tighter budget use [`remove_duplicates_into`],
/// which streams the merge and needs one slot per run.
///
/// # Errors
///
/// Same as [`sort`](super::sort::sort).
pub fn remove_duplicates<'e, S: Storage>(
    ctx: &ExecContext<'e, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
) -> Result<Deduped<'e, S>, ExecutorError> {
    let key = relation.schema().offset_of(column)?;
    if let Some(lease) = load_resident(ctx, relation)? {
        let removed = dedup_blocks(ctx.pool(), lease.slots(), key)?;
        debug!(relation = relation.name(), column, removed, "removed duplicates in memory");
        return Ok(Placement::Resident(lease));
    }

    debug!(relation = relation.name(), column, "removing duplicates with two passes");
    external::merge_to_relation(ctx, scope, relation, key, RunOrder::Dedup).map(Placement::Relation)
}

/// Removes duplicates into a temporary relation, whichever path is taken.
pub fn remove_duplicates_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
) -> Result<Relation<S>, ExecutorError> {
    remove_duplicates(ctx, scope, relation, column)?.into_relation(
        scope,
        RunOrder::Dedup.prefix(),
        relation.schema(),
    )
}

/// Streams the distinct tuples of `relation`, ordered on `column`, into
/// `sink`. Needs one slot fewer than [`remove_duplicates`] on the two-pass
/// path.
pub fn remove_duplicates_into<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    column: &str,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let key = relation.schema().offset_of(column)?;
    if let Some(lease) = load_resident(ctx, relation)? {
        let removed = dedup_blocks(ctx.pool(), lease.slots(), key)?;
        debug!(relation = relation.name(), column, removed, "removed duplicates in memory");
        return Placement::<S>::Resident(lease).for_each(ctx, sink);
    }

    debug!(relation = relation.name(), column, "removing duplicates with two passes");
    external::merge_into(ctx, scope, relation, key, RunOrder::Dedup, sink)
}
