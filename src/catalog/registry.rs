//! Catalog of relations over a shared storage backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::error::CatalogError;
use super::schema::Schema;
use crate::storage::{Relation, Storage};

/// First character of every temporary relation name.
pub const TEMP_PREFIX: char = '#';

/// Catalog of relations.
///
/// Holds `name → schema` in memory; block data lives in the storage backend,
/// one block file per relation. Lookups return [`Relation`] handles that
/// share the schema `Arc` and the storage.
///
/// The catalog itself is not persisted. A relation whose block file survives
/// from an earlier process (file-backed storage) is registered again with
/// [`Catalog::attach_relation`].
pub struct Catalog<S: Storage> {
    storage: Arc<S>,
    relations: RwLock<HashMap<String, Arc<Schema>>>,
    next_temp: AtomicU64,
}

impl<S: Storage> Catalog<S> {
    /// Creates an empty catalog over `storage`.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            relations: RwLock::new(HashMap::new()),
            next_temp: AtomicU64::new(1),
        }
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Creates an empty relation.
    ///
    /// # Errors
    ///
    /// - `CatalogError::InvalidName` if the name is empty or starts with
    ///   [`TEMP_PREFIX`]
    /// - `CatalogError::RelationExists` if the name is taken
    /// - `CatalogError::TupleTooWide` if one tuple does not fit in a block
    pub fn create_relation(
        &self,
        name: &str,
        schema: Schema,
    ) -> Result<Relation<S>, CatalogError> {
        if name.is_empty() || name.starts_with(TEMP_PREFIX) || name.contains('.') {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
            });
        }
        self.register(name, schema, true)
    }

    /// Registers a relation whose block file already exists in storage.
    ///
    /// # Errors
    ///
    /// Same as [`create_relation`](Self::create_relation); additionally
    /// `CatalogError::Storage` if the block file is missing or its size is not
    /// a whole number of blocks.
    pub fn attach_relation(
        &self,
        name: &str,
        schema: Schema,
    ) -> Result<Relation<S>, CatalogError> {
        if name.is_empty() || name.starts_with(TEMP_PREFIX) || name.contains('.') {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
            });
        }
        self.storage.block_count(name)?;
        self.register(name, schema, false)
    }

    /// Creates a temporary relation named `#<prefix>_<n>`.
    ///
    /// The caller owns the temporary and must delete it; see
    /// [`TempScope`](crate::executor::TempScope).
    pub fn create_temp(&self, prefix: &str, schema: Schema) -> Result<Relation<S>, CatalogError> {
        loop {
            let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}{}_{}", TEMP_PREFIX, prefix, n);
            match self.register(&name, schema.clone(), true) {
                Err(CatalogError::RelationExists { .. }) => continue,
                result => return result,
            }
        }
    }

    fn register(
        &self,
        name: &str,
        schema: Schema,
        create: bool,
    ) -> Result<Relation<S>, CatalogError> {
        let block_size = self.storage.block_size();
        if schema.block_capacity(block_size) == 0 {
            return Err(CatalogError::TupleTooWide {
                tuple_width: schema.tuple_width(),
                block_size,
            });
        }

        let mut relations = self.relations.write();
        if relations.contains_key(name) {
            return Err(CatalogError::RelationExists {
                name: name.to_string(),
            });
        }
        if create {
            self.storage.create(name)?;
        }

        let schema = Arc::new(schema);
        relations.insert(name.to_string(), schema.clone());
        debug!(relation = name, %schema, "registered relation");
        Ok(Relation::new(name, schema, self.storage.clone()))
    }

    /// Returns a handle to relation `name`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RelationNotFound` if it does not exist.
    pub fn relation(&self, name: &str) -> Result<Relation<S>, CatalogError> {
        let schema = self.schema(name)?;
        Ok(Relation::new(name, schema, self.storage.clone()))
    }

    /// Returns the schema of relation `name`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RelationNotFound` if it does not exist.
    pub fn schema(&self, name: &str) -> Result<Arc<Schema>, CatalogError> {
        self.relations
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::RelationNotFound {
                name: name.to_string(),
            })
    }

    /// Returns true if relation `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.relations.read().contains_key(name)
    }

    /// Deletes relation `name` and its block file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RelationNotFound` if it does not exist.
    pub fn delete_relation(&self, name: &str) -> Result<(), CatalogError> {
        let mut relations = self.relations.write();
        if relations.remove(name).is_none() {
            return Err(CatalogError::RelationNotFound {
                name: name.to_string(),
            });
        }
        self.storage.remove(name)?;
        debug!(relation = name, "deleted relation");
        Ok(())
    }

    /// Returns all relation names in sorted order, temporaries included.
    pub fn relation_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.relations.read().keys().cloned().collect();
        names.sort();
        names
    }
}
