//! Statement-scoped temporary relations.

use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogError, Schema};
use crate::storage::{Relation, Storage};

/// Owner of the temporary relations created while executing one statement.
///
/// Join, sort and duplicate-elimination outputs (and their scratch runs) are
/// created through the scope. Dropping the scope deletes every temporary it
/// still tracks, whether the statement succeeded or failed.
pub struct TempScope<'c, S: Storage> {
    catalog: &'c Catalog<S>,
    names: Vec<String>,
}

impl<'c, S: Storage> TempScope<'c, S> {
    /// Creates an empty scope.
    pub fn new(catalog: &'c Catalog<S>) -> Self {
        Self {
            catalog,
            names: Vec::new(),
        }
    }

    /// Creates a temporary relation and tracks it.
    pub fn create(&mut self, prefix: &str, schema: Schema) -> Result<Relation<S>, CatalogError> {
        let relation = self.catalog.create_temp(prefix, schema)?;
        self.names.push(relation.name().to_string());
        Ok(relation)
    }

    /// Deletes a tracked temporary before the scope ends.
    ///
    /// Names the scope does not track are left alone.
    pub fn discard(&mut self, name: &str) -> Result<(), CatalogError> {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            self.names.swap_remove(pos);
            self.catalog.delete_relation(name)?;
        }
        Ok(())
    }

    /// Returns the names of the tracked temporaries, oldest first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of tracked temporaries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no temporary is tracked.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Storage> Drop for TempScope<'_, S> {
    fn drop(&mut self) {
        if self.names.is_empty() {
            return;
        }
        debug!(count = self.names.len(), "deleting temporaries");
        for name in self.names.drain(..).rev() {
            if let Err(e) = self.catalog.delete_relation(&name) {
                warn!(relation = %name, error = %e, "failed to delete temporary");
            }
        }
    }
}
