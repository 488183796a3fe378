//! Tuple representation and fixed-width serialization.

use std::fmt::{self, Write as _};

use bytes::{Buf, BufMut};

use super::error::TupleError;
use crate::catalog::Schema;
use crate::datum::{Field, FieldType, STR20_LEN};

/// Flag byte of a block slot that holds no tuple.
pub(crate) const SLOT_EMPTY: u8 = 0;
/// Flag byte of a slot holding a live tuple.
pub(crate) const SLOT_LIVE: u8 = 1;
/// Flag byte of a slot holding a tombstoned tuple.
pub(crate) const SLOT_TOMBSTONE: u8 = 2;

/// A row of field values.
///
/// A tuple is value-like: cloning it copies its fields. Arity and per-position
/// types always match the schema it was built against; [`Tuple::new`]
/// enforces that. The tombstone flag is a deletion marker used by in-place
/// algorithms, not a SQL NULL.
///
/// # Example
///
/// ```
/// use blockdb::catalog::Schema;
/// use blockdb::datum::{Field, FieldType};
/// use blockdb::tuple::Tuple;
///
/// let schema = Schema::from_pairs([("id", FieldType::Integer), ("name", FieldType::Str20)])?;
/// let tuple = Tuple::new(&schema, vec![Field::Int(1), Field::from("a")])?;
/// assert_eq!(tuple.field(0), Some(&Field::Int(1)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    fields: Vec<Field>,
    tombstone: bool,
}

impl Tuple {
    /// Creates a tuple after checking it against `schema`.
    ///
    /// # Errors
    ///
    /// - `TupleError::ArityMismatch` if the field count differs
    /// - `TupleError::TypeMismatch` if a field has the wrong type
    /// - `TupleError::ValueTooLong` if a string exceeds [`STR20_LEN`] bytes
    /// - `TupleError::NulInText` if a string contains a NUL byte, which the
    ///   zero padding of the record encoding could not tell apart
    pub fn new(schema: &Schema, fields: Vec<Field>) -> Result<Self, TupleError> {
        if fields.len() != schema.len() {
            return Err(TupleError::ArityMismatch {
                expected: schema.len(),
                found: fields.len(),
            });
        }

        for (field, column) in fields.iter().zip(schema.columns()) {
            if field.field_type() != column.ty {
                return Err(TupleError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.ty,
                    found: field.field_type(),
                });
            }
            if let Field::Text(s) = field
                && s.len() > STR20_LEN
            {
                return Err(TupleError::ValueTooLong {
                    column: column.name.clone(),
                    len: s.len(),
                    limit: STR20_LEN,
                });
            }
            if let Field::Text(s) = field
                && s.contains('\0')
            {
                return Err(TupleError::NulInText {
                    column: column.name.clone(),
                });
            }
        }

        Ok(Self::from_fields(fields))
    }

    /// Creates a tuple from fields that are already known to match a schema.
    ///
    /// Used for tuples assembled from other tuples' fields (join inputs,
    /// projections), whose types were validated when first stored.
    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        Self {
            fields,
            tombstone: false,
        }
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the tuple has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns all fields in schema order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at `offset`.
    pub fn field(&self, offset: usize) -> Option<&Field> {
        self.fields.get(offset)
    }

    /// Consumes the tuple and returns its fields.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Returns true if this tuple is marked deleted.
    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }

    /// Marks this tuple deleted.
    pub fn mark_tombstone(&mut self) {
        self.tombstone = true;
    }

    /// Returns the full-tuple key used for duplicate detection.
    ///
    /// Every field is rendered in schema order with a type tag and, for
    /// strings, a length prefix, so distinct tuples never share a key.
    pub fn dedup_key(&self) -> String {
        let mut key = String::new();
        for field in &self.fields {
            // Writing to a String cannot fail.
            let _ = match field {
                Field::Int(n) => write!(key, "i{};", n),
                Field::Text(s) => write!(key, "s{}:{};", s.len(), s),
            };
        }
        key
    }

    /// Writes the fixed-width encoding of this tuple.
    ///
    /// The caller guarantees that `buf` has `schema.tuple_width()` bytes of
    /// room.
    pub(crate) fn encode<B: BufMut>(&self, schema: &Schema, buf: &mut B) {
        debug_assert_eq!(self.fields.len(), schema.len());

        buf.put_u8(if self.tombstone { SLOT_TOMBSTONE } else { SLOT_LIVE });
        for field in &self.fields {
            match field {
                Field::Int(n) => buf.put_i64_le(*n),
                Field::Text(s) => {
                    let bytes = s.as_bytes();
                    debug_assert!(bytes.len() <= STR20_LEN);
                    let len = bytes.len().min(STR20_LEN);
                    buf.put_slice(&bytes[..len]);
                    buf.put_bytes(0, STR20_LEN - len);
                }
            }
        }
    }

    /// Reads one fixed-width tuple of `schema` from `buf`.
    ///
    /// # Errors
    ///
    /// Returns `TupleError::InvalidEncoding` if `buf` is too short, the slot
    /// flag is not live or tombstoned, or a string is not valid UTF-8.
    pub(crate) fn decode<B: Buf>(schema: &Schema, buf: &mut B) -> Result<Self, TupleError> {
        if buf.remaining() < schema.tuple_width() {
            return Err(TupleError::InvalidEncoding(format!(
                "need {} bytes, have {}",
                schema.tuple_width(),
                buf.remaining()
            )));
        }

        let tombstone = match buf.get_u8() {
            SLOT_LIVE => false,
            SLOT_TOMBSTONE => true,
            flag => {
                return Err(TupleError::InvalidEncoding(format!(
                    "slot flag {}",
                    flag
                )));
            }
        };
        let mut fields = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let field = match column.ty {
                FieldType::Integer => Field::Int(buf.get_i64_le()),
                FieldType::Str20 => {
                    let mut raw = [0u8; STR20_LEN];
                    buf.copy_to_slice(&mut raw);
                    let len = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                    let s = std::str::from_utf8(&raw[..len]).map_err(|e| {
                        TupleError::InvalidEncoding(format!("column \"{}\": {}", column.name, e))
                    })?;
                    Field::Text(s.to_string())
                }
            };
            fields.push(field);
        }

        Ok(Self { fields, tombstone })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match field {
                Field::Int(n) => write!(f, "{}", n)?,
                Field::Text(s) => write!(f, "{:?}", s)?,
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_pairs([("id", FieldType::Integer), ("name", FieldType::Str20)]).unwrap()
    }

    #[test]
    fn test_new_validates_arity() {
        let err = Tuple::new(&schema(), vec![Field::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            TupleError::ArityMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_new_validates_types() {
        let err = Tuple::new(&schema(), vec![Field::from("1"), Field::from("a")]).unwrap_err();
        assert!(matches!(err, TupleError::TypeMismatch { column, .. } if column == "id"));
    }

    #[test]
    fn test_new_validates_string_length() {
        let long = "x".repeat(STR20_LEN + 1);
        let err = Tuple::new(&schema(), vec![Field::Int(1), Field::Text(long)]).unwrap_err();
        assert!(matches!(err, TupleError::ValueTooLong { len: 21, .. }));

        let exact = "y".repeat(STR20_LEN);
        assert!(Tuple::new(&schema(), vec![Field::Int(1), Field::Text(exact)]).is_ok());
    }

    #[test]
    fn test_new_rejects_nul_in_text() {
        for text in ["a\0", "\0", "a\0b"] {
            let err = Tuple::new(&schema(), vec![Field::Int(1), Field::from(text)]).unwrap_err();
            assert!(matches!(err, TupleError::NulInText { column } if column == "name"));
        }
    }

    #[test]
    fn test_text_survives_encoding() {
        let schema = schema();
        let full = "y".repeat(STR20_LEN);
        for text in ["", "a", "two words", full.as_str()] {
            let tuple = Tuple::new(&schema, vec![Field::Int(1), Field::from(text)]).unwrap();
            let mut buf = Vec::new();
            tuple.encode(&schema, &mut buf);
            assert_eq!(buf[0], SLOT_LIVE);
            assert_eq!(Tuple::decode(&schema, &mut buf.as_slice()).unwrap(), tuple);
        }
    }

    #[test]
    fn test_encode_decode_preserves_tombstone() {
        let schema = schema();
        let mut tuple = Tuple::new(&schema, vec![Field::Int(-7), Field::from("héllo")]).unwrap();
        tuple.mark_tombstone();

        let mut buf = Vec::new();
        tuple.encode(&schema, &mut buf);
        assert_eq!(buf.len(), schema.tuple_width());
        assert_eq!(buf[0], SLOT_TOMBSTONE);

        let decoded = Tuple::decode(&schema, &mut buf.as_slice()).unwrap();
        assert_eq!(decoded, tuple);
        assert!(decoded.is_tombstone());
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = Tuple::decode(&schema(), &mut [0u8; 4].as_slice()).unwrap_err();
        assert!(matches!(err, TupleError::InvalidEncoding(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_flag() {
        let schema = schema();
        for flag in [SLOT_EMPTY, 7] {
            let mut buf = vec![0u8; schema.tuple_width()];
            buf[0] = flag;
            let err = Tuple::decode(&schema, &mut buf.as_slice()).unwrap_err();
            assert!(matches!(err, TupleError::InvalidEncoding(_)));
        }
    }

    #[test]
    fn test_dedup_key_is_unambiguous() {
        let a = Tuple::from_fields(vec![Field::from("a;"), Field::from("b")]);
        let b = Tuple::from_fields(vec![Field::from("a"), Field::from(";b")]);
        assert_ne!(a.dedup_key(), b.dedup_key());

        let c = Tuple::from_fields(vec![Field::Int(1), Field::from("a")]);
        let d = Tuple::from_fields(vec![Field::Int(1), Field::from("a")]);
        assert_eq!(c.dedup_key(), d.dedup_key());
    }

    #[test]
    fn test_display() {
        let tuple = Tuple::from_fields(vec![Field::Int(2), Field::from("b")]);
        assert_eq!(tuple.to_string(), "(2, \"b\")");
    }
}
