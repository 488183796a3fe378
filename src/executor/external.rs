//! Two-pass external machinery shared by sort and duplicate elimination.
//!
//! # Algorithm
//!
//! ```text
//! pass 1 (run generation), k = free slots:
//!     for each group of k blocks:
//!         load, order in memory, write back to the "sublist" temporary
//!         at the same block positions
//!
//! pass 2 (merge), one slot per run (+1 output slot when materializing):
//!     heap := first live tuple of each run, keyed by (value, run, offset)
//!     while heap not empty:
//!         pop min, emit it, push the run's next live tuple
//!         (loading the run's next block when the current one is exhausted)
//! ```
//!
//! Two passes suffice while `runs (+1) <= k`, roughly `k * k` blocks.
//! Larger inputs fail with `ResourceExhausted`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;

use tracing::debug;

use super::context::ExecContext;
use super::dedup::{KeyGroupFilter, dedup_blocks};
use super::error::ExecutorError;
use super::scan::{TupleSink, scan};
use super::sort::sort_blocks;
use super::temp::TempScope;
use super::writer::BlockWriter;
use crate::catalog::Schema;
use crate::datum::Field;
use crate::storage::{Block, PoolError, Relation, SlotLease, Storage, StorageError};
use crate::tuple::Tuple;

/// Result of an operation that may finish entirely in the pool.
pub enum Placement<'p, S: Storage> {
    /// The relation fit in the pool and was processed in place; the lease
    /// holds one block per input block, in order.
    Resident(SlotLease<'p>),
    /// The result was written to a temporary relation.
    Relation(Relation<S>),
}

/// Result of [`sort`](super::sort::sort).
pub type Sorted<'p, S> = Placement<'p, S>;

/// Result of [`remove_duplicates`](super::dedup::remove_duplicates).
pub type Deduped<'p, S> = Placement<'p, S>;

impl<'p, S: Storage> Placement<'p, S> {
    /// Returns true if the result lives in pool slots.
    pub fn is_resident(&self) -> bool {
        matches!(self, Placement::Resident(_))
    }

    /// Passes every live tuple, in order, to `sink`.
    ///
    /// A stored result is scanned with one extra slot.
    pub fn for_each(
        &self,
        ctx: &ExecContext<'_, S>,
        sink: &mut TupleSink<'_>,
    ) -> Result<usize, ExecutorError> {
        match self {
            Placement::Resident(lease) => {
                let mut emitted = 0;
                for i in 0..lease.len() {
                    let block = lease.block(i);
                    for tuple in block.live() {
                        sink(tuple.clone())?;
                        emitted += 1;
                    }
                }
                Ok(emitted)
            }
            Placement::Relation(relation) => scan(ctx, relation, None, sink),
        }
    }

    /// Returns the live tuples in order.
    pub fn tuples(&self, ctx: &ExecContext<'_, S>) -> Result<Vec<Tuple>, ExecutorError> {
        let mut tuples = Vec::new();
        self.for_each(ctx, &mut |tuple| {
            tuples.push(tuple);
            Ok(())
        })?;
        Ok(tuples)
    }

    /// Turns the result into a relation, writing resident blocks to a new
    /// temporary without needing another slot. Tombstones are dropped on the
    /// way out.
    pub fn into_relation(
        self,
        scope: &mut TempScope<'_, S>,
        prefix: &str,
        schema: &Schema,
    ) -> Result<Relation<S>, ExecutorError> {
        match self {
            Placement::Relation(relation) => Ok(relation),
            Placement::Resident(lease) => {
                let relation = scope.create(prefix, schema.clone())?;
                for i in 0..lease.len() {
                    let mut block = lease.block(i);
                    block.compact();
                    if !block.is_empty() {
                        relation.append_block(&block)?;
                    }
                }
                Ok(relation)
            }
        }
    }
}

/// Loads all of `relation` into the pool if its blocks fit in the free slots.
pub(crate) fn load_resident<'e, S: Storage>(
    ctx: &ExecContext<'e, S>,
    relation: &Relation<S>,
) -> Result<Option<SlotLease<'e>>, ExecutorError> {
    let blocks = relation.block_count()?;
    if blocks > ctx.pool().free_count() {
        return Ok(None);
    }
    let lease = ctx.pool().lease_n(blocks)?;
    for i in 0..blocks {
        relation.read_block(i, &mut lease.block(i))?;
    }
    Ok(Some(lease))
}

/// In-memory step applied to each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOrder {
    Sort,
    Dedup,
}

impl RunOrder {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            RunOrder::Sort => "sorted",
            RunOrder::Dedup => "deduped",
        }
    }
}

/// Sorted runs written to a scratch relation.
struct Runs<S: Storage> {
    sublist: Relation<S>,
    bounds: Vec<Range<usize>>,
}

/// Runs pass 1 over all slots of `lease`, keeping `reserve` slots of
/// headroom for the merge.
fn generate_runs<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    key: usize,
    order: RunOrder,
    lease: &SlotLease<'_>,
    reserve: usize,
) -> Result<Runs<S>, ExecutorError> {
    let slots = lease.len();
    let blocks = relation.block_count()?;
    if slots == 0 || blocks.div_ceil(slots) + reserve > slots {
        let requested = match slots {
            0 => reserve + 1,
            _ => blocks.div_ceil(slots) + reserve,
        };
        return Err(PoolError::Exhausted {
            requested,
            available: slots,
        }
        .into());
    }

    let sublist = scope.create("sublist", relation.schema().as_ref().clone())?;
    let mut bounds = Vec::with_capacity(blocks.div_ceil(slots));
    let mut start = 0;
    while start < blocks {
        let n = slots.min(blocks - start);
        for i in 0..n {
            relation.read_block(start + i, &mut lease.block(i))?;
        }
        let run_slots = &lease.slots()[..n];
        match order {
            RunOrder::Sort => sort_blocks(ctx.pool(), run_slots, key)?,
            RunOrder::Dedup => {
                dedup_blocks(ctx.pool(), run_slots, key)?;
            }
        }
        for i in 0..n {
            sublist.write_block(start + i, &lease.block(i))?;
        }
        bounds.push(start..start + n);
        start += n;
    }

    debug!(
        relation = relation.name(),
        blocks,
        slots,
        runs = bounds.len(),
        "generated runs"
    );
    Ok(Runs { sublist, bounds })
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    key: Field,
    run: usize,
    offset: usize,
}

/// Read position within one run.
struct RunCursor {
    next_block: usize,
    end: usize,
}

impl RunCursor {
    /// Returns the offset of the first live tuple at or after `from`, loading
    /// further blocks of the run into `block` as needed.
    fn seek<S: Storage>(
        &mut self,
        sublist: &Relation<S>,
        block: &mut Block,
        mut from: usize,
    ) -> Result<Option<usize>, StorageError> {
        loop {
            let live = (from..block.len()).find(|&i| block.get(i).is_some_and(|t| !t.is_tombstone()));
            if live.is_some() {
                return Ok(live);
            }
            if self.next_block >= self.end {
                return Ok(None);
            }
            sublist.read_block(self.next_block, block)?;
            self.next_block += 1;
            from = 0;
        }
    }
}

/// Runs pass 2: merges the runs through the first `runs` slots of `lease`.
fn merge_runs<S: Storage>(
    runs: &Runs<S>,
    lease: &SlotLease<'_>,
    key: usize,
    mut filter: Option<KeyGroupFilter>,
    emit: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let mut cursors = Vec::with_capacity(runs.bounds.len());
    let mut heap = BinaryHeap::with_capacity(runs.bounds.len());
    for (run, bounds) in runs.bounds.iter().enumerate() {
        let mut block = lease.block(run);
        block.clear();
        let mut cursor = RunCursor {
            next_block: bounds.start,
            end: bounds.end,
        };
        if let Some(offset) = cursor.seek(&runs.sublist, &mut block, 0)? {
            heap.push(Reverse(entry(&block, key, run, offset)?));
        }
        cursors.push(cursor);
    }

    let mut emitted = 0;
    while let Some(Reverse(HeapEntry { run, offset, .. })) = heap.pop() {
        let tuple = {
            let mut block = lease.block(run);
            let tuple = block
                .get(offset)
                .cloned()
                .ok_or(StorageError::TupleIndexOutOfRange {
                    index: offset,
                    len: block.len(),
                })?;
            if let Some(next) = cursors[run].seek(&runs.sublist, &mut block, offset + 1)? {
                heap.push(Reverse(entry(&block, key, run, next)?));
            }
            tuple
        };

        if filter.as_mut().is_none_or(|f| f.admit(&tuple)) {
            emit(tuple)?;
            emitted += 1;
        }
    }
    Ok(emitted)
}

fn entry(block: &Block, key: usize, run: usize, offset: usize) -> Result<HeapEntry, StorageError> {
    let key = block
        .get(offset)
        .and_then(|t| t.field(key))
        .cloned()
        .ok_or(StorageError::TupleIndexOutOfRange {
            index: offset,
            len: block.len(),
        })?;
    Ok(HeapEntry { key, run, offset })
}

fn filter_for(order: RunOrder, key: usize) -> Option<KeyGroupFilter> {
    match order {
        RunOrder::Sort => None,
        RunOrder::Dedup => Some(KeyGroupFilter::new(key)),
    }
}

/// Two-pass run generation and merge into a new temporary relation.
///
/// Needs one slot per run plus one output slot.
pub(crate) fn merge_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    key: usize,
    order: RunOrder,
) -> Result<Relation<S>, ExecutorError> {
    let mut lease = ctx.pool().lease_all();
    let runs = generate_runs(ctx, scope, relation, key, order, &lease, 1)?;

    let mut output_lease = lease.split_off(runs.bounds.len());
    output_lease.shrink_to(1);
    let output = scope.create(order.prefix(), relation.schema().as_ref().clone())?;
    let mut writer = BlockWriter::new(output, output_lease);
    let rows = merge_runs(&runs, &lease, key, filter_for(order, key), &mut |tuple| {
        writer.push(tuple)
    })?;
    scope.discard(runs.sublist.name())?;

    debug!(relation = relation.name(), ?order, rows, "merged runs into relation");
    writer.finish()
}

/// Two-pass run generation and merge, streaming the result into `sink`.
///
/// Needs one slot per run.
pub(crate) fn merge_into<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    key: usize,
    order: RunOrder,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let mut lease = ctx.pool().lease_all();
    let runs = generate_runs(ctx, scope, relation, key, order, &lease, 0)?;
    lease.shrink_to(runs.bounds.len());

    let rows = merge_runs(&runs, &lease, key, filter_for(order, key), sink)?;
    scope.discard(runs.sublist.name())?;

    debug!(relation = relation.name(), ?order, rows, "merged runs into sink");
    Ok(rows)
}
