//! A relational query engine that runs in a fixed number of memory blocks.
//!
//! Relations are stored as sequences of fixed-size blocks. Every query
//! operation works on blocks checked out of a bounded [`MemoryPool`] and
//! spills to temporary relations when its input does not fit.
//!
//! - [`storage`]: blocks, relations, backing storage and the memory pool
//! - [`catalog`]: schemas and the relation registry
//! - [`executor`]: predicates, join, sort, duplicate removal and planning
//! - [`engine`]: the [`Engine`] entry point tying them together
//!
//! [`MemoryPool`]: storage::MemoryPool
//! [`Engine`]: engine::Engine

pub mod catalog;
pub mod datum;
pub mod engine;
pub mod executor;
pub mod storage;
pub mod tuple;
