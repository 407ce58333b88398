//! RefDataStore: deduplicated reference-data maps
//!
//! ```text
//! refdata-key    [map name (u16 len + UTF-8)][key UTF-8]  -> [ValueStoreKey]
//! refdata-value  [ValueStoreKey]                          -> [direct value]
//! refdata-meta   [ValueStoreKey]                          -> [type id][ref count]
//! ```
//!
//! Equal values stored under many keys, in one map or across maps, share one
//! value record. Each key holds one reference; the record is deleted with
//! the last reference.
//!
//! Unlike session keys, whose lookups are only reclaimed by a garbage
//! collection pass, value references are released synchronously: `put`,
//! `delete` and `purge_map` decrement the old value's count inside the same
//! write transaction that drops the reference. The single writer makes the
//! count exact, so no later sweep is needed.

use std::sync::Arc;

use tracing::{debug, info};

use planb_codec::val::{read_direct, write_delimited_str, write_direct};
use planb_codec::{
    create_hash_factory, Dereferenced, HashFactory, ValueStoreDb, ValueStoreKey,
};
use planb_core::{Error, HashLength, Result, Val, ValType};
use planb_storage::{KeyRange, MemoryEnv, ReadTxn, TableId, TableRegistry, WriteTxn};

/// Name the value store tables are opened under
pub const REF_DATA_DB_NAME: &str = "refdata";

/// Table mapping `(map, key)` to value references
pub const REF_DATA_KEY_TABLE_NAME: &str = "refdata-key";

/// Map of maps of typed values
#[derive(Debug)]
pub struct RefDataStore {
    env: Arc<MemoryEnv>,
    keys: TableId,
    values: ValueStoreDb,
}

impl RefDataStore {
    /// Create a store in a fresh environment
    pub fn create() -> Self {
        Self::open(Arc::new(MemoryEnv::new()))
    }

    /// Open a store over the tables of `env`
    pub fn open(env: Arc<MemoryEnv>) -> Self {
        Self::with_hash_factory(env, create_hash_factory(HashLength::Long))
    }

    /// Open a store hashing values with `hash_factory`
    pub fn with_hash_factory(env: Arc<MemoryEnv>, hash_factory: Arc<dyn HashFactory>) -> Self {
        let keys = env.open_table(REF_DATA_KEY_TABLE_NAME);
        let values = ValueStoreDb::new(env.as_ref(), REF_DATA_DB_NAME, hash_factory);
        RefDataStore { env, keys, values }
    }

    /// Underlying environment
    pub fn env(&self) -> &Arc<MemoryEnv> {
        &self.env
    }

    /// Store `val` under `key` of `map`, replacing any previous value
    ///
    /// The previous value is dereferenced in the same transaction.
    pub fn put(&self, map: &str, key: &str, val: &Val) -> Result<()> {
        let entry_key = entry_key(map, key)?;
        let mut bytes = Vec::new();
        write_direct(&mut bytes, val);
        self.env.write(|txn| {
            // Reference the new value before releasing the old one, so
            // rewriting an equal value never drops the record
            let value_key = self
                .values
                .get_or_create(txn, val.val_type().id(), &bytes)?;
            if let Some(old) = txn.get(self.keys, &entry_key)? {
                let old = ValueStoreKey::from_bytes(old)?;
                self.values.dereference(txn, &old)?;
            }
            txn.put(self.keys, &entry_key, &value_key.to_bytes())
        })
    }

    /// Value stored under `key` of `map`
    pub fn get(&self, map: &str, key: &str) -> Result<Option<Val>> {
        let entry_key = entry_key(map, key)?;
        let txn = self.env.begin_read();
        let Some(raw) = txn.get(self.keys, &entry_key)? else {
            return Ok(None);
        };
        let value_key = ValueStoreKey::from_bytes(raw)?;
        let missing = || Error::LookupMissing {
            table: self.values.name().to_string(),
            id: value_key.to_bytes().to_vec(),
        };
        let meta = self.values.get_meta(&txn, &value_key)?.ok_or_else(missing)?;
        let bytes = self.values.get(&txn, &value_key)?.ok_or_else(missing)?;
        read_direct(ValType::from_id(meta.type_id)?, bytes).map(Some)
    }

    /// References held on the value stored under `key` of `map`
    pub fn ref_count(&self, map: &str, key: &str) -> Result<Option<u32>> {
        let entry_key = entry_key(map, key)?;
        let txn = self.env.begin_read();
        let Some(raw) = txn.get(self.keys, &entry_key)? else {
            return Ok(None);
        };
        let meta = self.values.get_meta(&txn, &ValueStoreKey::from_bytes(raw)?)?;
        Ok(meta.map(|meta| meta.ref_count))
    }

    /// Remove `key` of `map`, returning whether it existed
    pub fn delete(&self, map: &str, key: &str) -> Result<bool> {
        let entry_key = entry_key(map, key)?;
        self.env.write(|txn| {
            let Some(raw) = txn.get(self.keys, &entry_key)? else {
                return Ok(false);
            };
            let value_key = ValueStoreKey::from_bytes(raw)?;
            self.values.dereference(txn, &value_key)?;
            txn.delete(self.keys, &entry_key)
        })
    }

    /// Remove every key of `map`, returning how many were removed
    pub fn purge_map(&self, map: &str) -> Result<u64> {
        let mut prefix = Vec::with_capacity(2 + map.len());
        write_delimited_str(&mut prefix, map)?;
        let (removed, freed) = self.env.write(|txn| {
            let value_keys = txn
                .scan(self.keys, KeyRange::prefix(&prefix))?
                .map(|(_, raw)| ValueStoreKey::from_bytes(raw))
                .collect::<Result<Vec<_>>>()?;
            let mut freed = 0u64;
            for value_key in &value_keys {
                if self.values.dereference(txn, value_key)? == Dereferenced::Deleted {
                    freed += 1;
                }
            }
            let removed = txn.delete_range(self.keys, KeyRange::prefix(&prefix))?;
            Ok((removed, freed))
        })?;
        info!(target: "planb::refdata", map, removed, freed, "Purged reference data map");
        Ok(removed)
    }

    /// Number of `(map, key)` entries
    pub fn entry_count(&self) -> Result<u64> {
        self.env.read(|txn| txn.entry_count(self.keys))
    }

    /// Number of distinct stored values
    pub fn value_count(&self) -> Result<u64> {
        let txn = self.env.begin_read();
        let count = self.values.entry_count(&txn)?;
        debug!(target: "planb::refdata", count, "Counted values");
        Ok(count)
    }
}

fn entry_key(map: &str, key: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(2 + map.len() + key.len());
    write_delimited_str(&mut out, map)?;
    out.extend_from_slice(key.as_bytes());
    Ok(out)
}
