//! Bounded-memory query execution.
//!
//! Every algorithm here works on blocks checked out of the shared
//! [`MemoryPool`](crate::storage::MemoryPool) and never holds more tuples in
//! memory than those slots contain. When data does not fit, the external
//! algorithms spill to temporary relations owned by a [`TempScope`].
//!
//! # Architecture
//!
//! ```text
//! SelectStatement
//!       |
//! [LogicalPlan::from_select] -- resolves columns, compiles predicates
//!       |
//! LogicalPlan (index arena)
//!   Projection / Sort / RemoveDuplicates
//!     CrossJoin / Selection
//!       Scan
//!       |
//! [runner] -- materializes inner nodes, streams the root
//!       |
//! scan, cross_join, sort, remove_duplicates
//!   ConditionEvaluator (postfix stack machine)
//!   external (run generation + k-way merge)
//! ```
//!
//! # Components
//!
//! - [`ConditionEvaluator`]: postfix predicate compiled against a schema
//! - [`cross_join`]: block-nested-loop join with projection
//! - [`sort`] / [`sort_resident`]: in-memory or two-pass external sort
//! - [`remove_duplicates`] / [`dedup_resident`]: full-tuple duplicate removal
//! - [`insert_tuples`], [`insert_from`], [`delete_where`]: data modification
//! - [`LogicalPlan`] and [`execute`]: SELECT planning and execution

mod condition;
mod context;
mod dedup;
mod dml;
mod error;
mod expr;
mod external;
mod join;
mod plan;
mod project;
mod runner;
mod scan;
mod sort;
mod temp;
mod writer;

pub use condition::ConditionEvaluator;
pub use context::ExecContext;
pub use dedup::{dedup_resident, remove_duplicates, remove_duplicates_into, remove_duplicates_to_relation};
pub use dml::{delete_where, insert_from, insert_tuples};
pub use error::ExecutorError;
pub use expr::{Expression, Operator, Token};
pub use external::{Deduped, Placement, Sorted};
pub use join::{JoinOutput, JoinSpec, cross_join, cross_join_to_relation};
pub use plan::{LogicalPlan, NodeId, PlanNode, SelectStatement};
pub use runner::{execute, execute_to_relation};
pub use scan::{Output, TupleSink, filter_to_relation, project_to_relation, scan};
pub use sort::{sort, sort_into, sort_resident, sort_to_relation};
pub use temp::TempScope;
