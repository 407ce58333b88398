//! Storage layer for Plan B
//!
//! This crate defines the ordered transactional key/value contract the codec
//! layer is written against, and a reference in-memory engine implementing it:
//! - `TableRegistry`, `ReadTxn`, `WriteTxn`: the consumed engine contract
//! - `KeyRange`: ordered and reverse range scans, byte-range deletes
//! - `MemoryEnv`: BTreeMap tables with snapshot reads and a single writer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod range;
pub mod snapshot;
pub mod traits;

pub use memory::{MemoryEnv, MemoryWriteTxn};
pub use range::{prefix_successor, KeyRange};
pub use snapshot::MemoryReadTxn;
pub use traits::{KvIter, KvRef, ReadTxn, TableId, TableRegistry, WriteTxn};
