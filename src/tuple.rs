//! Tuples and their fixed-width block encoding.
//!
//! This module provides:
//! - [`Tuple`]: an ordered array of [`Field`](crate::datum::Field)s plus a
//!   tombstone flag
//! - [`TupleError`]: validation failures when a tuple is built against a schema
//!
//! # Record Encoding
//!
//! Every tuple of a schema occupies the same number of bytes in a block:
//!
//! ```text
//! +----------------+------------------+------------------+-----
//! | flag (1B)      | field 0 (width0) | field 1 (width1) | ...
//! +----------------+------------------+------------------+-----
//! ```
//!
//! The flag is 1 for a live tuple and 2 for a tombstoned one; an all-zero
//! slot is empty. `INTEGER` is an 8-byte little-endian i64, `STR20` is 20
//! bytes of UTF-8 padded with zeros, so strings may not contain NUL.

mod error;
mod record;

pub use error::TupleError;
pub use record::Tuple;
pub(crate) use record::{SLOT_EMPTY, SLOT_LIVE};
