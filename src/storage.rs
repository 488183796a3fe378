//! Storage layer: blocks, relations, backing storage and the memory pool.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+      +-------------------+
//! | MemoryPool        | <--> | Relation          |  read_block / write_block
//! | (N Block slots)   |      | (schema + name)   |
//! +-------------------+      +-------------------+
//!                                     |
//!                                     v
//!                            +-------------------+
//!                            | Storage Trait     |  <- io
//!                            +-------------------+
//!                                  /      \
//!                                 v        v
//!                     +--------------+ +-------------+
//!                     | MemoryStorage| | FileStorage |
//!                     +--------------+ +-------------+
//! ```
//!
//! Tuples only ever live in a pool slot's [`Block`] or in a caller's local
//! variables; backing storage holds encoded bytes.

mod block;
pub mod error;
pub mod io;
pub mod pool;
mod relation;

pub use block::Block;
pub use error::StorageError;
pub use io::{FileStorage, MemoryStorage, Storage};
pub use pool::{MemoryPool, PoolError, PoolStats, SlotId, SlotLease};
pub use relation::Relation;
