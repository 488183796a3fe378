//! Relation catalog.
//!
//! The catalog maps relation names to schemas and hands out [`Relation`]
//! handles over the shared backing storage. It also names temporary
//! relations created by query algorithms.
//!
//! [`Relation`]: crate::storage::Relation
//!
//! ## Naming
//!
//! | Kind      | Example     | Created by                          |
//! |-----------|-------------|-------------------------------------|
//! | user      | `users`     | [`Catalog::create_relation`]        |
//! | temporary | `#sorted_4` | [`Catalog::create_temp`]            |
//!
//! Temporary names start with `#`, which user names may not contain.

mod error;
mod registry;
mod schema;

pub use error::{CatalogError, SchemaError};
pub use registry::{Catalog, TEMP_PREFIX};
pub use schema::{Column, Schema, FLAG_WIDTH};
