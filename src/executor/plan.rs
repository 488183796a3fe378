//! SELECT statements and their logical plans.
//!
//! A [`SelectStatement`] is lowered into a [`LogicalPlan`], an arena of
//! [`PlanNode`]s whose children are referenced by index:
//!
//! ```text
//! Projection        (select list)
//!   Sort            (ORDER BY)
//!     CrossJoin     (WHERE on the last join)
//!       CrossJoin
//!         Scan R
//!         Scan S
//!       Scan T
//! ```
//!
//! With DISTINCT the select list is projected first and `RemoveDuplicates`
//! becomes the root. Its output is ordered on its representative column,
//! which is the ORDER BY column when there is one, so no `Sort` is needed.
//! A single-table query filters with a `Selection` instead of a join.
//!
//! Planning resolves every column and compiles every predicate, so a plan
//! that builds can only fail at run time on data errors or pool exhaustion.

use std::fmt;

use super::condition::ConditionEvaluator;
use super::error::ExecutorError;
use super::expr::Expression;
use super::join::{JoinLayout, JoinSpec};
use super::project::Projection;
use crate::catalog::{Catalog, Schema, SchemaError};
use crate::storage::Storage;

/// A structured SELECT.
///
/// ```
/// use blockdb::executor::{Expression, SelectStatement};
///
/// let stmt = SelectStatement::new(["R", "S"])
///     .project(["R.name"])
///     .filter(Expression::parse("R.id S.id =")?)
///     .distinct()
///     .order_by("R.name");
/// assert_eq!(stmt.tables, vec!["R", "S"]);
/// # Ok::<(), blockdb::executor::ExecutorError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    /// FROM list, joined left to right.
    pub tables: Vec<String>,
    /// Select list; empty selects every column.
    pub columns: Vec<String>,
    /// WHERE predicate.
    pub predicate: Option<Expression>,
    /// SELECT DISTINCT.
    pub distinct: bool,
    /// ORDER BY column.
    pub order_by: Option<String>,
}

impl SelectStatement {
    /// Selects every column of `tables`.
    pub fn new<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the select list.
    pub fn project<I, T>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a WHERE predicate, AND-ed with any existing one.
    pub fn filter(mut self, predicate: Expression) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Removes duplicate result rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Orders the result on `column`.
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }
}

/// Index of a node in a [`LogicalPlan`].
pub type NodeId = usize;

/// One operator of a logical plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Reads a catalog relation.
    Scan { table: String },
    /// Keeps the tuples satisfying `predicate`.
    Selection { input: NodeId, predicate: Expression },
    /// Block-nested-loop join of two inputs.
    CrossJoin {
        left: NodeId,
        right: NodeId,
        predicate: Option<Expression>,
    },
    /// Removes full-tuple duplicates, ordered on `column`.
    RemoveDuplicates { input: NodeId, column: String },
    /// Orders the input on `column`.
    Sort { input: NodeId, column: String },
    /// Keeps `columns`, in that order.
    Projection { input: NodeId, columns: Vec<String> },
}

/// An arena of plan nodes with a designated root.
#[derive(Debug, Clone)]
pub struct LogicalPlan {
    nodes: Vec<PlanNode>,
    schemas: Vec<Schema>,
    root: NodeId,
}

impl LogicalPlan {
    /// Lowers `stmt` against the relations in `catalog`.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::Catalog` if a table does not exist
    /// - `ExecutorError::Schema` / `TypeMismatch` / `MalformedExpression`
    ///   for bad columns or predicates
    /// - `ExecutorError::Unsupported` for an empty FROM list, or a DISTINCT
    ///   query ordered on a column outside its select list
    pub fn from_select<S: Storage>(
        stmt: &SelectStatement,
        catalog: &Catalog<S>,
    ) -> Result<Self, ExecutorError> {
        let mut builder = Builder::default();

        let mut tables = stmt.tables.iter();
        let Some(first) = tables.next() else {
            return Err(ExecutorError::Unsupported(
                "SELECT needs at least one table".to_string(),
            ));
        };
        let mut node = builder.scan(catalog, first)?;
        let mut rest = tables.peekable();
        if rest.peek().is_none() {
            if let Some(predicate) = &stmt.predicate {
                node = builder.selection(node, predicate)?;
            }
        } else {
            while let Some(table) = rest.next() {
                let right = builder.scan(catalog, table)?;
                let predicate = if rest.peek().is_none() {
                    stmt.predicate.as_ref()
                } else {
                    None
                };
                node = builder.cross_join(node, right, predicate)?;
            }
        }

        if stmt.distinct {
            if !stmt.columns.is_empty() {
                node = builder.projection(node, &stmt.columns)?;
            }
            let representative = match &stmt.order_by {
                Some(column) => {
                    if let Err(e) = builder.schemas[node].offset_of(column) {
                        return Err(match e {
                            SchemaError::ColumnNotFound { .. } => ExecutorError::Unsupported(
                                format!("ORDER BY column \"{}\" must appear in the DISTINCT select list", column),
                            ),
                            e => e.into(),
                        });
                    }
                    column.clone()
                }
                None => builder.schemas[node].columns()[0].name.clone(),
            };
            // Output of duplicate removal is already ordered on the
            // representative column.
            let schema = builder.schemas[node].clone();
            node = builder.push(
                PlanNode::RemoveDuplicates {
                    input: node,
                    column: representative,
                },
                schema,
            );
        } else {
            if let Some(column) = &stmt.order_by {
                node = builder.sort(node, column)?;
            }
            if !stmt.columns.is_empty() {
                node = builder.projection(node, &stmt.columns)?;
            }
        }

        Ok(Self {
            nodes: builder.nodes,
            schemas: builder.schemas,
            root: node,
        })
    }

    /// Returns the root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a node of this plan.
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id]
    }

    /// Returns all nodes; children always precede their parents.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Returns the output schema of node `id`.
    pub fn schema(&self, id: NodeId) -> &Schema {
        &self.schemas[id]
    }

    /// Returns the schema of the plan's result.
    pub fn output_schema(&self) -> &Schema {
        &self.schemas[self.root]
    }

    /// Renders the plan as an indented tree, root first.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_node(self.root, 0, &mut out);
        out
    }

    fn explain_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let prefix = "  ".repeat(depth);
        let line = match &self.nodes[id] {
            PlanNode::Scan { table } => format!("Scan: {}", table),
            PlanNode::Selection { predicate, .. } => format!("Selection: {}", predicate),
            PlanNode::CrossJoin { predicate, .. } => match predicate {
                Some(predicate) => format!("CrossJoin: {}", predicate),
                None => "CrossJoin".to_string(),
            },
            PlanNode::RemoveDuplicates { column, .. } => format!("RemoveDuplicates: {}", column),
            PlanNode::Sort { column, .. } => format!("Sort: {}", column),
            PlanNode::Projection { columns, .. } => format!("Projection: {}", columns.join(", ")),
        };
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&prefix);
        out.push_str(&line);

        match &self.nodes[id] {
            PlanNode::Scan { .. } => {}
            PlanNode::CrossJoin { left, right, .. } => {
                self.explain_node(*left, depth + 1, out);
                self.explain_node(*right, depth + 1, out);
            }
            PlanNode::Selection { input, .. }
            | PlanNode::RemoveDuplicates { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Projection { input, .. } => self.explain_node(*input, depth + 1, out),
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

/// Appends nodes while tracking each node's output schema.
#[derive(Default)]
struct Builder {
    nodes: Vec<PlanNode>,
    schemas: Vec<Schema>,
}

impl Builder {
    fn push(&mut self, node: PlanNode, schema: Schema) -> NodeId {
        self.nodes.push(node);
        self.schemas.push(schema);
        self.nodes.len() - 1
    }

    fn scan<S: Storage>(&mut self, catalog: &Catalog<S>, table: &str) -> Result<NodeId, ExecutorError> {
        let schema = catalog.schema(table)?;
        Ok(self.push(
            PlanNode::Scan {
                table: table.to_string(),
            },
            schema.as_ref().clone(),
        ))
    }

    fn selection(&mut self, input: NodeId, predicate: &Expression) -> Result<NodeId, ExecutorError> {
        let schema = self.schemas[input].clone();
        ConditionEvaluator::compile(predicate, &schema)?;
        Ok(self.push(
            PlanNode::Selection {
                input,
                predicate: predicate.clone(),
            },
            schema,
        ))
    }

    fn cross_join(
        &mut self,
        left: NodeId,
        right: NodeId,
        predicate: Option<&Expression>,
    ) -> Result<NodeId, ExecutorError> {
        let spec = JoinSpec {
            predicate,
            ..JoinSpec::default()
        };
        let layout = JoinLayout::resolve_schemas(&self.join_input(left), &self.join_input(right), &spec)?;
        if let Some(predicate) = predicate {
            ConditionEvaluator::compile(predicate, layout.schema())?;
        }
        Ok(self.push(
            PlanNode::CrossJoin {
                left,
                right,
                predicate: predicate.cloned(),
            },
            layout.schema().clone(),
        ))
    }

    /// Schema a join sees for `input`: scans are qualified by table name,
    /// earlier join outputs are already qualified.
    fn join_input(&self, input: NodeId) -> Schema {
        match &self.nodes[input] {
            PlanNode::Scan { table } => self.schemas[input].qualified(table),
            _ => self.schemas[input].clone(),
        }
    }

    fn sort(&mut self, input: NodeId, column: &str) -> Result<NodeId, ExecutorError> {
        let schema = self.schemas[input].clone();
        schema.offset_of(column)?;
        Ok(self.push(
            PlanNode::Sort {
                input,
                column: column.to_string(),
            },
            schema,
        ))
    }

    fn projection(&mut self, input: NodeId, columns: &[String]) -> Result<NodeId, ExecutorError> {
        let projection = Projection::new(&self.schemas[input], columns)?;
        Ok(self.push(
            PlanNode::Projection {
                input,
                columns: columns.to_vec(),
            },
            projection.schema().clone(),
        ))
    }
}
