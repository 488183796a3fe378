//! Block-nested-loop join with projection.
//!
//! # Algorithm
//!
//! ```text
//! small := input with fewer blocks, large := the other
//! slots := all free pool slots
//!   1 slot  -> current large block
//!   1 slot  -> output buffer (materializing only)
//!   rest    -> batch of small blocks
//!
//! for each batch of small blocks:
//!     for each large block:
//!         for each (s, l) live pair:
//!             t := input tuple built from s and l
//!             if predicate(t): emit project(t)
//! ```
//!
//! The large relation is scanned once per batch, so a bigger pool means fewer
//! scans. The result does not depend on the batch size or on which side is
//! small.

use std::fmt;

use tracing::debug;

use super::condition::{ConditionEvaluator, accepts, compile_predicate};
use super::context::ExecContext;
use super::error::ExecutorError;
use super::expr::Expression;
use super::project::Projection;
use super::scan::{Output, TupleSink};
use super::temp::TempScope;
use super::writer::BlockWriter;
use crate::catalog::{Column, Schema, SchemaError};
use crate::storage::{PoolError, Relation, Storage};
use crate::tuple::Tuple;

/// Columns and predicate of a join.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinSpec<'a> {
    /// Predicate over the input schema; `None` keeps every pair.
    pub predicate: Option<&'a Expression>,
    /// Columns needed downstream; empty means every column of both inputs.
    /// Projection and predicate columns are always included.
    pub select: &'a [String],
    /// Output columns; empty means the whole input schema.
    pub project: &'a [String],
}

/// Result of [`cross_join`].
pub struct JoinOutput<S: Storage> {
    /// The output relation when materializing.
    pub relation: Option<Relation<S>>,
    /// Number of output tuples.
    pub rows: usize,
}

impl<S: Storage> fmt::Debug for JoinOutput<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOutput")
            .field("relation", &self.relation)
            .field("rows", &self.rows)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Input schema of a join and where each of its columns comes from.
#[derive(Debug)]
pub(crate) struct JoinLayout {
    input: Schema,
    sources: Vec<(Side, usize)>,
}

impl JoinLayout {
    /// Builds the input schema: the wanted columns qualified by relation
    /// name, left columns first, each side in caller order.
    pub(crate) fn resolve<S: Storage>(
        left: &Relation<S>,
        right: &Relation<S>,
        spec: &JoinSpec<'_>,
    ) -> Result<Self, ExecutorError> {
        Self::resolve_schemas(
            &left.schema().qualified(left.name()),
            &right.schema().qualified(right.name()),
            spec,
        )
    }

    pub(crate) fn resolve_schemas(
        left: &Schema,
        right: &Schema,
        spec: &JoinSpec<'_>,
    ) -> Result<Self, ExecutorError> {
        let mut sources = Vec::new();
        if spec.select.is_empty() {
            sources.extend((0..left.len()).map(|o| (Side::Left, o)));
            sources.extend((0..right.len()).map(|o| (Side::Right, o)));
        } else {
            let wanted = spec
                .select
                .iter()
                .chain(spec.project)
                .map(String::as_str)
                .chain(spec.predicate.into_iter().flat_map(|p| p.columns()));
            for name in wanted {
                let source = locate(left, right, name)?;
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
            // Stable: keeps caller order within each side.
            sources.sort_by_key(|&(side, _)| side == Side::Right);
        }

        let columns = sources
            .iter()
            .map(|&(side, offset)| match side {
                Side::Left => left.columns()[offset].clone(),
                Side::Right => right.columns()[offset].clone(),
            })
            .collect::<Vec<Column>>();
        let input = Schema::new(columns)?;
        Ok(Self { input, sources })
    }

    /// Returns the input schema.
    pub(crate) fn schema(&self) -> &Schema {
        &self.input
    }

    fn combine(&self, left: &Tuple, right: &Tuple) -> Tuple {
        Tuple::from_fields(
            self.sources
                .iter()
                .map(|&(side, offset)| match side {
                    Side::Left => left.fields()[offset].clone(),
                    Side::Right => right.fields()[offset].clone(),
                })
                .collect(),
        )
    }
}

fn locate(left: &Schema, right: &Schema, name: &str) -> Result<(Side, usize), ExecutorError> {
    let found = |result: Result<usize, SchemaError>| match result {
        Ok(offset) => Ok(Some(offset)),
        Err(SchemaError::ColumnNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    };
    match (found(left.offset_of(name))?, found(right.offset_of(name))?) {
        (Some(offset), None) => Ok((Side::Left, offset)),
        (None, Some(offset)) => Ok((Side::Right, offset)),
        (Some(_), Some(_)) => Err(SchemaError::AmbiguousColumn {
            name: name.to_string(),
        }
        .into()),
        (None, None) => Err(SchemaError::ColumnNotFound {
            name: name.to_string(),
        }
        .into()),
    }
}

/// Joins `left` and `right` with a block-nested loop.
///
/// Output tuples follow the projection of the input schema (see
/// [`JoinSpec`]). When materializing, the output relation is a temporary
/// owned by `scope`.
///
/// # Errors
///
/// - `ExecutorError::Schema` for unknown or ambiguous columns
/// - `ExecutorError::ResourceExhausted` if fewer than 3 slots (2 when
///   streaming) are free
/// - any error from the predicate or the sink; all slots are released first
pub fn cross_join<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    left: &Relation<S>,
    right: &Relation<S>,
    spec: &JoinSpec<'_>,
    output: Output<'_>,
) -> Result<JoinOutput<S>, ExecutorError> {
    let join = PreparedJoin::new(left, right, spec)?;
    match output {
        Output::Stream(sink) => Ok(JoinOutput {
            relation: None,
            rows: join.run(ctx, sink)?,
        }),
        Output::Materialize => {
            let (relation, rows) = join.materialize(ctx, scope)?;
            Ok(JoinOutput {
                relation: Some(relation),
                rows,
            })
        }
    }
}

/// Joins `left` and `right` into a new temporary relation.
pub fn cross_join_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    left: &Relation<S>,
    right: &Relation<S>,
    spec: &JoinSpec<'_>,
) -> Result<Relation<S>, ExecutorError> {
    let (relation, _) = PreparedJoin::new(left, right, spec)?.materialize(ctx, scope)?;
    Ok(relation)
}

/// A join whose columns and predicate have been resolved.
struct PreparedJoin<'r, S: Storage> {
    left: &'r Relation<S>,
    right: &'r Relation<S>,
    layout: JoinLayout,
    projection: Projection,
    predicate: Option<ConditionEvaluator>,
}

impl<'r, S: Storage> PreparedJoin<'r, S> {
    fn new(
        left: &'r Relation<S>,
        right: &'r Relation<S>,
        spec: &JoinSpec<'_>,
    ) -> Result<Self, ExecutorError> {
        let layout = JoinLayout::resolve(left, right, spec)?;
        let projection = Projection::new(layout.schema(), spec.project)?;
        let predicate = compile_predicate(spec.predicate, layout.schema())?;
        Ok(Self {
            left,
            right,
            layout,
            projection,
            predicate,
        })
    }

    fn materialize(
        &self,
        ctx: &ExecContext<'_, S>,
        scope: &mut TempScope<'_, S>,
    ) -> Result<(Relation<S>, usize), ExecutorError> {
        let free = ctx.pool().free_count();
        if free < 3 {
            return Err(PoolError::Exhausted {
                requested: 3,
                available: free,
            }
            .into());
        }

        let output = scope.create("join", self.projection.schema().clone())?;
        let mut writer = BlockWriter::new(output, ctx.pool().lease()?);
        let rows = self.run(ctx, &mut |tuple| writer.push(tuple))?;
        Ok((writer.finish()?, rows))
    }

    /// Runs the nested loop over every free slot, passing output tuples to
    /// `emit`.
    fn run(&self, ctx: &ExecContext<'_, S>, emit: &mut TupleSink<'_>) -> Result<usize, ExecutorError> {
        let (left_blocks, right_blocks) = (self.left.block_count()?, self.right.block_count()?);
        let (small, large, small_side) = if left_blocks <= right_blocks {
            (self.left, self.right, Side::Left)
        } else {
            (self.right, self.left, Side::Right)
        };
        let small_blocks = left_blocks.min(right_blocks);
        let large_blocks = left_blocks.max(right_blocks);

        let mut batch_lease = ctx.pool().lease_all();
        if batch_lease.len() < 2 {
            return Err(PoolError::Exhausted {
                requested: 2,
                available: batch_lease.len(),
            }
            .into());
        }
        let large_lease = batch_lease.split_off(batch_lease.len() - 1);
        batch_lease.shrink_to(small_blocks.max(1));
        let batch = batch_lease.len();

        debug!(
            small = small.name(),
            large = large.name(),
            small_blocks,
            large_blocks,
            batch,
            "block nested loop join"
        );

        let mut rows = 0;
        let mut start = 0;
        while start < small_blocks {
            let n = batch.min(small_blocks - start);
            for i in 0..n {
                small.read_block(start + i, &mut batch_lease.block(i))?;
            }

            for j in 0..large_blocks {
                let mut large_block = large_lease.block(0);
                large.read_block(j, &mut large_block)?;
                for i in 0..n {
                    let small_block = batch_lease.block(i);
                    for s in small_block.live() {
                        for l in large_block.live() {
                            let input = match small_side {
                                Side::Left => self.layout.combine(s, l),
                                Side::Right => self.layout.combine(l, s),
                            };
                            if accepts(self.predicate.as_ref(), &input)? {
                                emit(self.projection.apply(&input))?;
                                rows += 1;
                            }
                        }
                    }
                }
            }
            start += n;
        }

        debug!(rows, "join finished");
        Ok(rows)
    }
}
