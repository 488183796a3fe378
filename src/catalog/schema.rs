//! Relation schemas and column resolution.
//!
//! A [`Schema`] is an ordered list of named, typed columns. Column names may
//! carry a `relation.column` qualifier; joins produce schemas whose columns
//! are all qualified so that identically-named columns of the two inputs stay
//! distinguishable.

use std::fmt;

use super::error::SchemaError;
use crate::datum::FieldType;

/// Bytes used by the per-tuple occupancy flag in a block.
pub const FLAG_WIDTH: usize = 1;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// Column name, optionally qualified as `relation.column`.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
}

impl Column {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Returns the column name without its relation qualifier.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// Returns true if the name carries a `relation.` qualifier.
    pub fn is_qualified(&self) -> bool {
        self.name.contains('.')
    }
}

/// Ordered list of columns describing the tuples of a relation.
///
/// Immutable once attached to a relation; relations share it through an
/// `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema from columns.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Empty` for an empty column list and
    /// `SchemaError::DuplicateColumn` if two columns share a name.
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Creates a schema from `(name, type)` pairs.
    pub fn from_pairs<I, N>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (N, FieldType)>,
        N: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, ty)| Column::new(name, ty))
                .collect(),
        )
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns all columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column at `offset`.
    pub fn column(&self, offset: usize) -> Option<&Column> {
        self.columns.get(offset)
    }

    /// Returns the type of the column at `offset`.
    pub fn field_type(&self, offset: usize) -> Option<FieldType> {
        self.columns.get(offset).map(|c| c.ty)
    }

    /// Returns the column names in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the column types in order.
    pub fn field_types(&self) -> Vec<FieldType> {
        self.columns.iter().map(|c| c.ty).collect()
    }

    /// Resolves a column reference to its offset.
    ///
    /// Resolution order:
    /// 1. an exact name match;
    /// 2. an unqualified reference `c` matches a unique qualified column `t.c`;
    /// 3. a qualified reference `t.c` matches an unqualified column `c`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::AmbiguousColumn` if rule 2 or 3 matches more than
    /// one column, or `SchemaError::ColumnNotFound` if nothing matches.
    pub fn offset_of(&self, name: &str) -> Result<usize, SchemaError> {
        if let Some(offset) = self.columns.iter().position(|c| c.name == name) {
            return Ok(offset);
        }

        let mut candidates = self.columns.iter().enumerate().filter(|(_, c)| {
            if name.contains('.') {
                !c.is_qualified() && c.name == base_name(name)
            } else {
                c.is_qualified() && c.base_name() == name
            }
        });

        match (candidates.next(), candidates.next()) {
            (Some((offset, _)), None) => Ok(offset),
            (Some(_), Some(_)) => Err(SchemaError::AmbiguousColumn {
                name: name.to_string(),
            }),
            _ => Err(SchemaError::ColumnNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Returns a copy with every unqualified column prefixed by `relation.`.
    ///
    /// Already-qualified columns (for example the output of an earlier join)
    /// keep their name.
    pub fn qualified(&self, relation: &str) -> Schema {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.is_qualified() {
                    c.clone()
                } else {
                    Column::new(format!("{}.{}", relation, c.name), c.ty)
                }
            })
            .collect();
        Schema { columns }
    }

    /// Returns true if both schemas have the same column types in the same order.
    pub fn is_type_compatible(&self, other: &Schema) -> bool {
        self.len() == other.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Returns the number of bytes one tuple occupies in a block.
    pub fn tuple_width(&self) -> usize {
        FLAG_WIDTH + self.columns.iter().map(|c| c.ty.width()).sum::<usize>()
    }

    /// Returns how many tuples fit in a block of `block_size` bytes.
    pub fn block_capacity(&self, block_size: usize) -> usize {
        block_size / self.tuple_width()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", column.name, column.ty)?;
        }
        f.write_str(")")
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, base)| base)
}
