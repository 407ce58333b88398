//! State stores for Plan B
//!
//! This crate builds the stores applications talk to on top of the codecs:
//! - SessionDb: sessions keyed by subject and time range, with state
//!   queries, condensing, retention and merging
//! - RefDataStore: reference-data maps with deduplicated, reference-counted
//!   values
//!
//! Both own their tables inside a shared `MemoryEnv` and perform every
//! operation in a single transaction of that environment.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ref_data;
pub mod session_db;

pub use ref_data::{RefDataStore, REF_DATA_DB_NAME, REF_DATA_KEY_TABLE_NAME};
pub use session_db::{SessionDb, SESSION_TABLE_NAME};
