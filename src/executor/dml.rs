//! Data modification: literal inserts, INSERT-from-SELECT and DELETE.
//!
//! All three run inside the memory pool budget:
//! - INSERT uses one slot for the output buffer
//! - INSERT-from-SELECT uses one slot to read and one to write
//! - DELETE counts matches in a read-only pass, then compacts the survivors
//!   with a read slot and a write slot and truncates the freed tail

use tracing::debug;

use super::condition::{accepts, compile_predicate};
use super::context::ExecContext;
use super::error::ExecutorError;
use super::expr::Expression;
use super::scan::scan;
use super::writer::BlockWriter;
use crate::datum::Field;
use crate::storage::{Relation, Storage};
use crate::tuple::Tuple;

/// Appends literal rows to `relation`.
///
/// Every row is validated against the schema before anything is written, so
/// a bad row leaves the relation untouched. Returns the number of rows
/// inserted.
///
/// # Errors
///
/// - `ExecutorError::Tuple` on arity, type or length violations
/// - `ExecutorError::ResourceExhausted` if no slot is free
pub fn insert_tuples<S: Storage>(
    ctx: &ExecContext<'_, S>,
    relation: &Relation<S>,
    rows: Vec<Vec<Field>>,
) -> Result<usize, ExecutorError> {
    let schema = relation.schema();
    let tuples = rows
        .into_iter()
        .map(|fields| Tuple::new(schema, fields))
        .collect::<Result<Vec<_>, _>>()?;
    if tuples.is_empty() {
        return Ok(0);
    }

    let mut writer = BlockWriter::append_to(relation.clone(), ctx.pool().lease()?)?;
    for tuple in tuples {
        writer.push(tuple)?;
    }
    let inserted = writer.written();
    writer.finish()?;
    debug!(relation = relation.name(), inserted, "inserted rows");
    Ok(inserted)
}

/// Copies every live tuple of `source` to the end of `target`.
///
/// # Errors
///
/// - `ExecutorError::IncompatibleSchemas` if the column types differ
/// - `ExecutorError::Unsupported` if `source` and `target` are the same
///   relation
pub fn insert_from<S: Storage>(
    ctx: &ExecContext<'_, S>,
    source: &Relation<S>,
    target: &Relation<S>,
) -> Result<usize, ExecutorError> {
    if source.name() == target.name() {
        return Err(ExecutorError::Unsupported(format!(
            "relation \"{}\" cannot be copied into itself",
            source.name()
        )));
    }
    if !source.schema().is_type_compatible(target.schema()) {
        return Err(ExecutorError::IncompatibleSchemas {
            left: source.schema().to_string(),
            right: target.schema().to_string(),
        });
    }

    let mut writer = BlockWriter::append_to(target.clone(), ctx.pool().lease()?)?;
    scan(ctx, source, None, &mut |tuple| {
        writer.push(Tuple::from_fields(tuple.into_fields()))
    })?;
    let inserted = writer.written();
    writer.finish()?;
    debug!(source = source.name(), target = target.name(), inserted, "copied rows");
    Ok(inserted)
}

/// Deletes the tuples of `relation` matching `predicate` (all tuples when
/// `None`) and returns how many were deleted.
///
/// The predicate is first evaluated over every tuple without writing
/// anything, so an evaluation error leaves the relation untouched. If
/// anything matched, the surviving tuples are then packed towards the front
/// and the emptied tail blocks are truncated away.
pub fn delete_where<S: Storage>(
    ctx: &ExecContext<'_, S>,
    relation: &Relation<S>,
    predicate: Option<&Expression>,
) -> Result<usize, ExecutorError> {
    let predicate = compile_predicate(predicate, relation.schema())?;
    let lease = ctx.pool().lease_n(2)?;
    let block_count = relation.block_count()?;

    let mut deleted = 0;
    for index in 0..block_count {
        let mut block = lease.block(0);
        relation.read_block(index, &mut block)?;
        for tuple in block.live() {
            if accepts(predicate.as_ref(), tuple)? {
                deleted += 1;
            }
        }
    }

    if deleted == 0 {
        return Ok(0);
    }

    // Compaction never overtakes the read position: output block `w` is only
    // written once at least `w + 1` input blocks have been read.
    let mut write_index = 0;
    {
        let mut output = lease.block(1);
        relation.bind(&mut output);
        for index in 0..block_count {
            let mut input = lease.block(0);
            relation.read_block(index, &mut input)?;
            for tuple in input.take_tuples() {
                if tuple.is_tombstone() || accepts(predicate.as_ref(), &tuple)? {
                    continue;
                }
                if let Err(tuple) = output.try_append(tuple) {
                    relation.write_block(write_index, &output)?;
                    write_index += 1;
                    output.clear();
                    let _ = output.try_append(tuple);
                }
            }
        }
        if !output.is_empty() {
            relation.write_block(write_index, &output)?;
            write_index += 1;
        }
    }
    relation.truncate(write_index)?;

    debug!(
        relation = relation.name(),
        deleted,
        blocks_before = block_count,
        blocks_after = write_index,
        "deleted rows"
    );
    Ok(deleted)
}
