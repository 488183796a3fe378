//! Row scans over relations.

use tracing::debug;

use super::condition::{accepts, compile_predicate};
use super::context::ExecContext;
use super::error::ExecutorError;
use super::expr::Expression;
use super::project::Projection;
use super::temp::TempScope;
use super::writer::BlockWriter;
use crate::storage::{Relation, Storage};
use crate::tuple::Tuple;

/// Consumer of result tuples.
///
/// Returning an error stops the producing algorithm, which then releases its
/// slots and reports the error.
pub type TupleSink<'a> = dyn FnMut(Tuple) -> Result<(), ExecutorError> + 'a;

/// Where an algorithm delivers its result tuples.
pub enum Output<'s> {
    /// Write into a new temporary relation registered with the statement's
    /// [`TempScope`]. Costs one extra pool slot for the output buffer.
    Materialize,
    /// Hand every tuple to a callback.
    Stream(&'s mut TupleSink<'s>),
}

impl Output<'_> {
    /// Returns true for [`Output::Materialize`].
    pub fn is_materialize(&self) -> bool {
        matches!(self, Output::Materialize)
    }
}

/// Streams the live tuples of `relation` that satisfy `predicate` into
/// `sink`, using one pool slot.
///
/// Returns the number of tuples emitted.
///
/// # Errors
///
/// - `ExecutorError::ResourceExhausted` if no slot is free
/// - `ExecutorError::Schema` / `TypeMismatch` if the predicate does not
///   compile against the relation's schema
pub fn scan<S: Storage>(
    ctx: &ExecContext<'_, S>,
    relation: &Relation<S>,
    predicate: Option<&Expression>,
    sink: &mut TupleSink<'_>,
) -> Result<usize, ExecutorError> {
    let predicate = compile_predicate(predicate, relation.schema())?;
    let lease = ctx.pool().lease()?;

    let mut emitted = 0;
    for index in 0..relation.block_count()? {
        let mut block = lease.block(0);
        relation.read_block(index, &mut block)?;
        for tuple in block.live() {
            if accepts(predicate.as_ref(), tuple)? {
                sink(tuple.clone())?;
                emitted += 1;
            }
        }
    }
    Ok(emitted)
}

/// Materializes the tuples of `relation` satisfying `predicate` into a new
/// temporary. Uses two pool slots.
pub fn filter_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    predicate: Option<&Expression>,
) -> Result<Relation<S>, ExecutorError> {
    // Fail on a bad predicate before any temporary exists.
    compile_predicate(predicate, relation.schema())?;

    let lease = ctx.pool().lease()?;
    let output = scope.create("select", relation.schema().as_ref().clone())?;
    let mut writer = BlockWriter::new(output, lease);
    scan(ctx, relation, predicate, &mut |tuple| writer.push(tuple))?;
    debug!(source = relation.name(), rows = writer.written(), "selection materialized");
    writer.finish()
}

/// Materializes `columns` of every live tuple of `relation` into a new
/// temporary. Uses two pool slots.
pub fn project_to_relation<S: Storage>(
    ctx: &ExecContext<'_, S>,
    scope: &mut TempScope<'_, S>,
    relation: &Relation<S>,
    columns: &[String],
) -> Result<Relation<S>, ExecutorError> {
    let projection = Projection::new(relation.schema(), columns)?;

    let lease = ctx.pool().lease()?;
    let output = scope.create("project", projection.schema().clone())?;
    let mut writer = BlockWriter::new(output, lease);
    scan(ctx, relation, None, &mut |tuple| {
        writer.push(projection.apply(&tuple))
    })?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, Schema};
    use crate::datum::{Field, FieldType};
    use crate::executor::dml::insert_tuples;
    use crate::storage::{MemoryPool, MemoryStorage};

    fn setup() -> (Catalog<MemoryStorage>, MemoryPool) {
        // 2 tuples of 29 bytes per block
        let catalog = Catalog::new(Arc::new(MemoryStorage::new(64)));
        let schema =
            Schema::from_pairs([("id", FieldType::Integer), ("name", FieldType::Str20)]).unwrap();
        catalog.create_relation("r", schema).unwrap();
        (catalog, MemoryPool::new(3))
    }

    fn load(ctx: &ExecContext<'_, MemoryStorage>, n: i64) -> Relation<MemoryStorage> {
        let rel = ctx.catalog().relation("r").unwrap();
        let rows = (0..n)
            .map(|i| vec![Field::Int(i), Field::Text(format!("n{}", i))])
            .collect();
        insert_tuples(ctx, &rel, rows).unwrap();
        rel
    }

    #[test]
    fn test_scan_with_predicate() {
        let (catalog, pool) = setup();
        let ctx = ExecContext::new(&catalog, &pool);
        let rel = load(&ctx, 5);

        let mut seen = Vec::new();
        let predicate = Expression::parse("id 2 >").unwrap();
        let n = scan(&ctx, &rel, Some(&predicate), &mut |t| {
            seen.push(t.fields()[0].clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![Field::Int(3), Field::Int(4)]);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_sink_error_releases_slot() {
        let (catalog, pool) = setup();
        let ctx = ExecContext::new(&catalog, &pool);
        let rel = load(&ctx, 3);
        let err = scan(&ctx, &rel, None, &mut |_| {
            Err(ExecutorError::Unsupported("stop".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ExecutorError::Unsupported(_)));
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    fn test_filter_to_relation() {
        let (catalog, pool) = setup();
        let ctx = ExecContext::new(&catalog, &pool);
        let rel = load(&ctx, 6);
        let mut scope = TempScope::new(&catalog);

        let predicate = Expression::parse("name 'n3' < ").unwrap();
        let out = filter_to_relation(&ctx, &mut scope, &rel, Some(&predicate)).unwrap();
        assert_eq!(out.tuple_count().unwrap(), 3);
        assert_eq!(scope.len(), 1);
        drop(scope);
        assert!(!catalog.contains(out.name()));
    }

    #[test]
    fn test_project_to_relation() {
        let (catalog, pool) = setup();
        let ctx = ExecContext::new(&catalog, &pool);
        let rel = load(&ctx, 4);
        let mut scope = TempScope::new(&catalog);

        let out = project_to_relation(&ctx, &mut scope, &rel, &["name".to_string()]).unwrap();
        assert_eq!(out.schema().field_names(), vec!["name"]);
        assert_eq!(out.tuple_count().unwrap(), 4);
    }

    #[test]
    fn test_bad_predicate_creates_nothing() {
        let (catalog, pool) = setup();
        let ctx = ExecContext::new(&catalog, &pool);
        let rel = load(&ctx, 1);
        let mut scope = TempScope::new(&catalog);
        let predicate = Expression::parse("missing 1 =").unwrap();
        assert!(filter_to_relation(&ctx, &mut scope, &rel, Some(&predicate)).is_err());
        assert!(scope.is_empty());
    }
}
