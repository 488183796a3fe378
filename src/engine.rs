//! Engine orchestrator owning the catalog and the memory pool.
//!
//! The [`Engine`] type is the main entry point. It runs one statement at a
//! time against relations in backing storage, with all query memory drawn
//! from a fixed [`MemoryPool`].
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------------------------+
//! |                          Engine                            |
//! |                                                            |
//! |  +----------------+  +----------------+  +--------------+  |
//! |  | Catalog<S>     |  | MemoryPool     |  | EngineConfig |  |
//! |  | (name->schema, |  | (pool_slots    |  | (pool_slots, |  |
//! |  |  temporaries)  |  |  block slots)  |  |  block_size) |  |
//! |  +-------+--------+  +----------------+  +--------------+  |
//! |          |                                                 |
//! +----------+-------------------------------------------------+
//!            |
//!            v
//!      +---------------------+
//!      |  storage::Storage   |
//!      | (Memory / File)     |
//!      +---------------------+
//! ```
//!
//! Every statement gets its own [`TempScope`]; temporaries created while it
//! runs are deleted when it returns, whether it succeeded or not.

mod config;
mod error;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::catalog::{Catalog, Schema};
use crate::datum::Field;
use crate::executor::{
    ExecContext, ExecutorError, Expression, LogicalPlan, SelectStatement, TempScope, delete_where,
    execute, execute_to_relation, insert_from, insert_tuples,
};
use crate::storage::{FileStorage, MemoryPool, MemoryStorage, Relation, Storage};
use crate::tuple::Tuple;

/// Runs statements over a catalog of block relations within a fixed pool.
///
/// ```
/// use blockdb::catalog::Schema;
/// use blockdb::datum::{Field, FieldType};
/// use blockdb::engine::{Engine, EngineConfig};
/// use blockdb::executor::{Expression, SelectStatement};
///
/// let engine = Engine::in_memory(EngineConfig::default())?;
/// engine.create_table("R", Schema::from_pairs([("id", FieldType::Integer)])?)?;
/// engine.insert("R", vec![vec![Field::Int(1)], vec![Field::Int(2)]])?;
///
/// let stmt = SelectStatement::new(["R"]).filter(Expression::parse("id 1 >")?);
/// let rows = engine.select_rows(&stmt)?;
/// assert_eq!(rows.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Engine<S: Storage> {
    config: EngineConfig,
    catalog: Catalog<S>,
    pool: MemoryPool,
}

impl Engine<MemoryStorage> {
    /// Opens an engine over fresh in-memory storage.
    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let storage = MemoryStorage::new(config.block_size);
        Self::open(storage, config)
    }
}

impl Engine<FileStorage> {
    /// Opens an engine storing one block file per relation under `dir`.
    ///
    /// Relations from an earlier run are not registered automatically; use
    /// [`attach_table`](Self::attach_table).
    pub fn open_dir(dir: impl Into<PathBuf>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let storage = FileStorage::open(dir, config.block_size)?;
        Self::open(storage, config)
    }
}

impl<S: Storage> Engine<S> {
    /// Opens an engine over `storage`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if the configuration is invalid
    /// or its block size differs from the storage's.
    pub fn open(storage: S, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        if storage.block_size() != config.block_size {
            return Err(EngineError::InvalidConfig(format!(
                "storage block size {} does not match configured {}",
                storage.block_size(),
                config.block_size
            )));
        }

        debug!(
            pool_slots = config.pool_slots,
            block_size = config.block_size,
            "opened engine"
        );
        Ok(Self {
            catalog: Catalog::new(Arc::new(storage)),
            pool: MemoryPool::new(config.pool_slots),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    /// Returns the memory pool.
    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Returns an execution context for calling the algorithms directly.
    pub fn ctx(&self) -> ExecContext<'_, S> {
        ExecContext::new(&self.catalog, &self.pool)
    }

    /// Creates an empty table.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Relation<S>, EngineError> {
        Ok(self.catalog.create_relation(name, schema)?)
    }

    /// Registers a table whose block file already exists in storage.
    pub fn attach_table(&self, name: &str, schema: Schema) -> Result<Relation<S>, EngineError> {
        Ok(self.catalog.attach_relation(name, schema)?)
    }

    /// Deletes a table and its blocks.
    #[instrument(skip(self))]
    pub fn drop_table(&self, name: &str) -> Result<(), EngineError> {
        Ok(self.catalog.delete_relation(name)?)
    }

    /// Appends literal rows to `table`. Returns the number of rows inserted.
    #[instrument(skip(self, rows))]
    pub fn insert(&self, table: &str, rows: Vec<Vec<Field>>) -> Result<usize, EngineError> {
        let relation = self.catalog.relation(table)?;
        Ok(insert_tuples(&self.ctx(), &relation, rows)?)
    }

    /// Runs a SELECT, passing every result tuple to `sink`. Returns the
    /// number of tuples produced.
    pub fn select<F>(&self, stmt: &SelectStatement, mut sink: F) -> Result<usize, EngineError>
    where
        F: FnMut(Tuple) -> Result<(), ExecutorError>,
    {
        let plan = LogicalPlan::from_select(stmt, &self.catalog)?;
        debug!(plan = %plan, "select");
        let mut scope = TempScope::new(&self.catalog);
        Ok(execute(&self.ctx(), &mut scope, &plan, &mut sink)?)
    }

    /// Runs a SELECT and collects the result.
    pub fn select_rows(&self, stmt: &SelectStatement) -> Result<Vec<Tuple>, EngineError> {
        let mut rows = Vec::new();
        self.select(stmt, |tuple| {
            rows.push(tuple);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Runs a SELECT and appends its result to `target`
    /// (INSERT INTO target SELECT ...). Returns the number of rows inserted.
    ///
    /// The result is materialized before the first row is written, so the
    /// SELECT may read `target` itself.
    #[instrument(skip(self, stmt))]
    pub fn insert_select(&self, target: &str, stmt: &SelectStatement) -> Result<usize, EngineError> {
        let target = self.catalog.relation(target)?;
        let plan = LogicalPlan::from_select(stmt, &self.catalog)?;
        debug!(plan = %plan, "insert select");

        let ctx = self.ctx();
        let mut scope = TempScope::new(&self.catalog);
        let mut source = execute_to_relation(&ctx, &mut scope, &plan)?;
        if source.name() == target.name() {
            // A bare scan of the target: copy it out first.
            let copy = scope.create("insert", source.schema().as_ref().clone())?;
            insert_from(&ctx, &source, &copy)?;
            source = copy;
        }
        Ok(insert_from(&ctx, &source, &target)?)
    }

    /// Deletes the rows of `table` matching `predicate`, or every row when
    /// `None`. Returns the number of rows deleted.
    #[instrument(skip(self, predicate))]
    pub fn delete(&self, table: &str, predicate: Option<&Expression>) -> Result<usize, EngineError> {
        let relation = self.catalog.relation(table)?;
        debug!(predicate = ?predicate.map(|p| p.to_string()), "delete");
        Ok(delete_where(&self.ctx(), &relation, predicate)?)
    }

    /// Returns the plan of a SELECT as an indented tree.
    pub fn explain(&self, stmt: &SelectStatement) -> Result<String, EngineError> {
        Ok(LogicalPlan::from_select(stmt, &self.catalog)?.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::FieldType;
    use crate::storage::PoolError;

    /// Opens an in-memory engine with `R(id INT, name STR20)` loaded.
    fn open_test_engine(config: EngineConfig) -> Engine<MemoryStorage> {
        let engine = Engine::in_memory(config).unwrap();
        let schema =
            Schema::from_pairs([("id", FieldType::Integer), ("name", FieldType::Str20)]).unwrap();
        engine.create_table("R", schema).unwrap();
        engine
            .insert(
                "R",
                vec![
                    vec![Field::Int(2), Field::from("b")],
                    vec![Field::Int(1), Field::from("a")],
                    vec![Field::Int(3), Field::from("c")],
                ],
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_open_rejects_mismatched_block_size() {
        let storage = MemoryStorage::new(128);
        let result = Engine::open(storage, EngineConfig::default());
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_select_order_by() {
        let engine = open_test_engine(EngineConfig::default());
        let stmt = SelectStatement::new(["R"]).project(["name"]).order_by("id");
        let names: Vec<Field> = engine
            .select_rows(&stmt)
            .unwrap()
            .into_iter()
            .map(|t| t.fields()[0].clone())
            .collect();
        assert_eq!(names, vec![Field::from("a"), Field::from("b"), Field::from("c")]);
    }

    #[test]
    fn test_insert_select_from_self() {
        let engine = open_test_engine(EngineConfig::default());
        let n = engine.insert_select("R", &SelectStatement::new(["R"])).unwrap();
        assert_eq!(n, 3);
        assert_eq!(engine.select_rows(&SelectStatement::new(["R"])).unwrap().len(), 6);
        assert_eq!(engine.catalog().relation_names(), vec!["R"]);
    }

    #[test]
    fn test_delete_and_drop() {
        let engine = open_test_engine(EngineConfig::default());
        let predicate = Expression::parse("name 'b' =").unwrap();
        assert_eq!(engine.delete("R", Some(&predicate)).unwrap(), 1);
        assert_eq!(engine.select_rows(&SelectStatement::new(["R"])).unwrap().len(), 2);

        engine.drop_table("R").unwrap();
        let err = engine.select_rows(&SelectStatement::new(["R"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_kinds() {
        let engine = open_test_engine(EngineConfig::default().with_pool_slots(1));
        let stmt = SelectStatement::new(["R"]).filter(Expression::parse("id 'x' =").unwrap());
        assert_eq!(
            engine.select_rows(&stmt).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );

        let stmt = SelectStatement::new(["R"]).project(["missing"]);
        assert_eq!(
            engine.select_rows(&stmt).unwrap_err().kind(),
            ErrorKind::SchemaMismatch
        );

        // deleting needs a read slot and a write slot
        let err = engine.delete("R", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(matches!(
            err,
            EngineError::Executor(ExecutorError::ResourceExhausted(PoolError::Exhausted {
                requested: 2,
                available: 1
            }))
        ));
    }

    #[test]
    fn test_explain() {
        let engine = open_test_engine(EngineConfig::default());
        let stmt = SelectStatement::new(["R"]).distinct();
        assert_eq!(engine.explain(&stmt).unwrap(), "RemoveDuplicates: id\n  Scan: R");
    }
}
