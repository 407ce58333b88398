//! Plan B - lookup-deduplicating key/value codecs for embedded state stores
//!
//! Plan B turns typed, variable-shaped subjects (scalars, strings, tag sets)
//! bounded by a time range into compact ordered byte keys for a transactional
//! ordered key/value engine. Large or repeated values are interned behind
//! surrogate ids and reclaimed by mark-and-sweep.
//!
//! # Quick Start
//!
//! ```ignore
//! use planb::{KeyPrefix, Session, SessionDb, SessionSettings};
//!
//! let db = SessionDb::create(SessionSettings::default())?;
//! db.insert(&Session::new(KeyPrefix::val("door-1"), start, end)?)?;
//! let open = db.get_state(&KeyPrefix::val("door-1"), now)?;
//! ```
//!
//! # Architecture
//!
//! - `planb_core`: values, sessions, settings and errors (re-exported at the root)
//! - [`storage`]: the ordered transactional KV contract and `MemoryEnv`
//! - [`codec`]: value, time and session key codecs, lookup tables, GC
//! - [`engine`]: `SessionDb` and `RefDataStore`

pub use planb_codec as codec;
pub use planb_engine as engine;
pub use planb_storage as storage;

pub use planb_codec::{create_key_serde, GarbageCollector, GcStats, SessionSerde};
pub use planb_core::{
    Error, HashLength, KeyPrefix, KeySchema, KeyType, Result, Session, SessionSettings, Tag,
    TemporalPrecision, Val, ValType,
};
pub use planb_engine::{RefDataStore, SessionDb};
pub use planb_storage::{KeyRange, MemoryEnv, ReadTxn, TableRegistry, WriteTxn};
