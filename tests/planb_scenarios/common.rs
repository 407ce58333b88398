//! Shared helpers for the scenario suites

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use planb::codec::{create_key_serde_with_hash, HashFactory};
use planb::{
    KeyPrefix, KeyType, MemoryEnv, ReadTxn, Session, SessionDb, SessionSettings, TableRegistry,
};

/// Instant at `ms` epoch milliseconds
pub fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

/// Single-value session
pub fn session(subject: impl Into<planb::Val>, start: i64, end: i64) -> Session {
    Session::new(KeyPrefix::val(subject), at(start), at(end)).unwrap()
}

/// Hashes everything to the same value
#[derive(Debug)]
pub struct ConstantHash;

impl HashFactory for ConstantHash {
    fn hash(&self, _: &[u8]) -> u64 {
        0x5eed
    }

    fn len(&self) -> usize {
        8
    }
}

/// A session store whose hash lookups always collide
pub fn colliding_store(key_type: KeyType) -> SessionDb {
    let settings = SessionSettings::with_key_type(key_type);
    let env = Arc::new(MemoryEnv::with_max_key_length(settings.max_key_length));
    let serde = create_key_serde_with_hash(&settings, env.as_ref(), Arc::new(ConstantHash)).unwrap();
    SessionDb::with_serde(env, settings, serde)
}

/// Entries in the named table of `db`'s environment
pub fn table_len(db: &SessionDb, name: &str) -> u64 {
    let table = db.env().open_table(name);
    db.env().read(|txn| txn.entry_count(table)).unwrap()
}

/// Entries across both key lookup tables
pub fn lookup_entries(db: &SessionDb) -> u64 {
    table_len(db, "key-uid") + table_len(db, "key-hash")
}
