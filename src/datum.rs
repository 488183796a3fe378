//! Field types and values.
//!
//! This module defines the two column types the engine stores and the tagged
//! [`Field`] value that occupies one position of a tuple. [`FieldType`] fixes
//! the on-block width of a column; [`Field`] carries the payload, and its
//! variant is the authoritative type tag.

use std::cmp::Ordering;
use std::fmt;

/// Maximum byte length of a `STR20` value.
pub const STR20_LEN: usize = 20;

/// On-block width of an `INTEGER` value (little-endian i64).
pub const INT_WIDTH: usize = 8;

/// Column type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// Fixed-length string of at most [`STR20_LEN`] bytes.
    Str20,
}

impl FieldType {
    /// Returns the SQL display name for this type (e.g., `"INT"`, `"STR20"`).
    pub const fn display_name(self) -> &'static str {
        match self {
            FieldType::Integer => "INT",
            FieldType::Str20 => "STR20",
        }
    }

    /// Returns the fixed number of bytes a value of this type occupies in a block.
    pub const fn width(self) -> usize {
        match self {
            FieldType::Integer => INT_WIDTH,
            FieldType::Str20 => STR20_LEN,
        }
    }

    /// Parses a type name as written in DDL (`INT`, `INTEGER`, `STR20`).
    ///
    /// Returns `None` for unknown names. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Some(FieldType::Integer),
            "STR20" => Some(FieldType::Str20),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A typed field value.
///
/// The variant is the type tag; a `Field` never holds both payloads, so type
/// and payload cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    /// `INTEGER` value.
    Int(i64),
    /// `STR20` value.
    Text(String),
}

impl Field {
    /// Returns the column type this value belongs to.
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Integer,
            Field::Text(_) => FieldType::Str20,
        }
    }

    /// Returns the integer payload, if this is an `INTEGER` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::Int(n) => Some(*n),
            Field::Text(_) => None,
        }
    }

    /// Returns the string payload, if this is a `STR20` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Int(_) => None,
            Field::Text(s) => Some(s),
        }
    }

    /// Compares two values of the same type.
    ///
    /// Integers compare numerically and strings lexicographically by bytes.
    /// Returns `None` when the types differ.
    pub fn compare(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::Text(a), Field::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

/// Total order used for sorting: integers before strings, then by value.
///
/// Within a single column every value has the same type, so the cross-type
/// rule only keeps the order total.
impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.compare(other) {
            Some(ord) => ord,
            None => match self {
                Field::Int(_) => Ordering::Less,
                Field::Text(_) => Ordering::Greater,
            },
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(n) => write!(f, "{}", n),
            Field::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Field {
    fn from(n: i64) -> Self {
        Field::Int(n)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_widths() {
        assert_eq!(FieldType::Integer.width(), 8);
        assert_eq!(FieldType::Str20.width(), 20);
    }

    #[test]
    fn test_type_from_name() {
        assert_eq!(FieldType::from_name("int"), Some(FieldType::Integer));
        assert_eq!(FieldType::from_name("INTEGER"), Some(FieldType::Integer));
        assert_eq!(FieldType::from_name("str20"), Some(FieldType::Str20));
        assert_eq!(FieldType::from_name("TEXT"), None);
    }

    #[test]
    fn test_field_type_tag() {
        assert_eq!(Field::Int(1).field_type(), FieldType::Integer);
        assert_eq!(Field::from("a").field_type(), FieldType::Str20);
    }

    #[test]
    fn test_compare_same_type() {
        assert_eq!(Field::Int(-3).compare(&Field::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Field::from("b").compare(&Field::from("ab")),
            Some(Ordering::Greater)
        );
        assert_eq!(Field::from("x").compare(&Field::from("x")), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_cross_type() {
        assert_eq!(Field::Int(1).compare(&Field::from("1")), None);
        assert!(Field::Int(i64::MAX) < Field::from(""));
    }

    #[test]
    fn test_display() {
        assert_eq!(Field::Int(42).to_string(), "42");
        assert_eq!(Field::from("hello").to_string(), "hello");
        assert_eq!(FieldType::Str20.to_string(), "STR20");
    }
}
