//! Key and value codecs for Plan B
//!
//! This crate turns sessions into ordered byte keys and back:
//! - Value codec: direct, tagged and delimited encodings of `Val`
//! - Time codec: sortable fixed-width instants at a chosen precision
//! - Lookup tables: sequential and hash surrogate ids for large values
//! - Value store: deduplicated, reference-counted values
//! - Session serde: one strategy per key type, selected from settings
//! - GC: mark-and-sweep of lookup entries no key references
//!
//! # Buffers
//!
//! Encoders write into a caller-owned `Vec<u8>` and return a slice of it.
//! A write transaction may reuse one buffer for every key it writes; the
//! returned slice must be consumed before the buffer is used again, which
//! the borrow checker enforces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytes;
pub mod gc;
pub mod hash;
pub mod lookup;
pub mod session;
pub mod time;
pub mod val;
pub mod value_store;

pub use bytes::{ByteReader, UnsignedBytes};
pub use gc::{GarbageCollector, GcPhase, GcStats, NoOpRecorder, UsedLookups, UsedLookupsRecorder};
pub use hash::{create_hash_factory, HashFactory, IntegerHashFactory, LongHashFactory};
pub use lookup::{HashId, HashLookupDb, UidLookupDb};
pub use session::{
    create_key_serde, create_key_serde_with_hash, HashLookupSessionSerde,
    LimitedStringSessionSerde, ScalarSessionSerde, SessionSerde, TagsSessionSerde,
    UidLookupSessionSerde, VariableSessionSerde, VariableTier, KEY_LOOKUP_DB_NAME,
};
pub use time::TimeSerde;
pub use value_store::{Dereferenced, ValueStoreDb, ValueStoreKey, ValueStoreMeta};
