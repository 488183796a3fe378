//! Executes logical plans.
//!
//! Inner nodes are materialized into relations (scans use the catalog
//! relation directly, everything else writes a temporary owned by the
//! statement's [`TempScope`]). The root node streams into the caller's sink,
//! which saves the output slot: a DISTINCT or ORDER BY at the root can merge
//! one more run than its materializing form.

use tracing::debug;

use super::context::ExecContext;
use super::dedup::{remove_duplicates_into, remove_duplicates_to_relation};
use super::error::ExecutorError;
use super::join::{JoinSpec, cross_join, cross_join_to_relation};
use super::plan::{LogicalPlan, NodeId, PlanNode};
use super::project::Projection;
use super::scan::{Output, TupleSink, filter_to_relation, project_to_relation, scan};
use super::sort::{sort_into, sort_to_relation};
use super::temp::TempScope;
use crate::storage::{Relation, Storage};

/// Runs `plan`, streaming result tuples into `sink`. Returns the number of
/// tuples produced.
pub fn execute<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    plan: &LogicalPlan,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let rows = stream(ctx, scope, plan, plan.root(), sink)?;
    debug!(rows, temporaries = scope.len(), "plan executed");
    Ok(rows)
}

/// Runs `plan` into a relation. The result is a temporary owned by `scope`
/// unless the plan is a bare scan.
pub fn execute_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    plan: &LogicalPlan,
) -> Result<Relation<S>, ExecutorError> {
    materialize(ctx, scope, plan, plan.root())
}

fn stream<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    plan: &LogicalPlan,
    id: NodeId,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    match plan.node(id) {
        PlanNode::Scan { table } => {
            let relation = ctx.catalog().relation(table)?;
            scan(ctx, &relation, None, sink)
        }
        PlanNode::Selection { input, predicate } => {
            let relation = materialize(ctx, scope, plan, *input)?;
            scan(ctx, &relation, Some(predicate), sink)
        }
        PlanNode::CrossJoin {
            left,
            right,
            predicate,
        } => {
            let left = materialize(ctx, scope, plan, *left)?;
            let right = materialize(ctx, scope, plan, *right)?;
            let spec = JoinSpec {
                predicate: predicate.as_ref(),
                ..JoinSpec::default()
            };
            let mut forward = |tuple| sink(tuple);
            let output = cross_join(ctx, scope, &left, &right, &spec, Output::Stream(&mut forward))?;
            Ok(output.rows)
        }
        PlanNode::RemoveDuplicates { input, column } => {
            let relation = materialize(ctx, scope, plan, *input)?;
            remove_duplicates_into(ctx, scope, &relation, column, sink)
        }
        PlanNode::Sort { input, column } => {
            let relation = materialize(ctx, scope, plan, *input)?;
            sort_into(ctx, scope, &relation, column, sink)
        }
        PlanNode::Projection { input, columns } => {
            let projection = Projection::new(plan.schema(*input), columns)?;
            stream(ctx, scope, plan, *input, &mut |tuple| {
                sink(projection.apply(&tuple))
            })
        }
    }
}

fn materialize<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    plan: &LogicalPlan,
    id: NodeId,
) -> Result<Relation<S>, ExecutorError> {
    let relation = match plan.node(id) {
        PlanNode::Scan { table } => ctx.catalog().relation(table)?,
        PlanNode::Selection { input, predicate } => {
            let input = materialize(ctx, scope, plan, *input)?;
            filter_to_relation(ctx, scope, &input, Some(predicate))?
        }
        PlanNode::CrossJoin {
            left,
            right,
            predicate,
        } => {
            let left = materialize(ctx, scope, plan, *left)?;
            let right = materialize(ctx, scope, plan, *right)?;
            let spec = JoinSpec {
                predicate: predicate.as_ref(),
                ..JoinSpec::default()
            };
            cross_join_to_relation(ctx, scope, &left, &right, &spec)?
        }
        PlanNode::RemoveDuplicates { input, column } => {
            let input = materialize(ctx, scope, plan, *input)?;
            remove_duplicates_to_relation(ctx, scope, &input, column)?
        }
        PlanNode::Sort { input, column } => {
            let input = materialize(ctx, scope, plan, *input)?;
            sort_to_relation(ctx, scope, &input, column)?
        }
        PlanNode::Projection { input, columns } => {
            let input = materialize(ctx, scope, plan, *input)?;
            project_to_relation(ctx, scope, &input, columns)?
        }
    };
    debug!(node = id, relation = relation.name(), "materialized plan node");
    Ok(relation)
}
