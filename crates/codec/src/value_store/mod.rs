//! Reference-counted value store
//!
//! Deduplicates values across keys. Two tables share one key space:
//!
//! ```text
//! {name}-value  [ValueStoreKey]  -> [value bytes]
//! {name}-meta   [ValueStoreKey]  -> [ValueStoreMeta]
//! ```
//!
//! Storing a value that is already present bumps its reference count;
//! dereferencing the last reference deletes both records.

mod key;
mod meta;

pub use key::ValueStoreKey;
pub use meta::{
    clone_and_decrement_ref_count, clone_and_increment_ref_count, read_ref_count, read_type_id,
    ValueStoreMeta, META_LEN, REF_COUNT_OFFSET, TYPE_ID_OFFSET,
};

use std::sync::Arc;

use tracing::debug;

use planb_core::{Error, Result};
use planb_storage::{ReadTxn, TableId, TableRegistry, WriteTxn};

use crate::hash::HashFactory;
use crate::lookup::{probe_bucket, Probe, DEFAULT_MAX_UNIQUE_ID};

/// What happened to a value when a reference to it was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dereferenced {
    /// References remain
    Decremented(u32),
    /// That was the last reference; the value is gone
    Deleted,
}

/// Deduplicating reference-counted value tables
#[derive(Debug, Clone)]
pub struct ValueStoreDb {
    name: String,
    value_table: TableId,
    meta_table: TableId,
    hash_factory: Arc<dyn HashFactory>,
    max_unique_id: u16,
}

impl ValueStoreDb {
    /// Open the tables for `name`
    pub fn new(env: &dyn TableRegistry, name: &str, hash_factory: Arc<dyn HashFactory>) -> Self {
        ValueStoreDb {
            name: format!("{name}-value"),
            value_table: env.open_table(&format!("{name}-value")),
            meta_table: env.open_table(&format!("{name}-meta")),
            hash_factory,
            max_unique_id: DEFAULT_MAX_UNIQUE_ID,
        }
    }

    /// Name the tables were opened under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cap the unique id space of every hash bucket
    pub fn with_max_unique_id(mut self, max_unique_id: u16) -> Self {
        self.max_unique_id = max_unique_id;
        self
    }

    /// Store one reference to `bytes` of type `type_id`
    pub fn get_or_create(
        &self,
        txn: &mut dyn WriteTxn,
        type_id: u8,
        bytes: &[u8],
    ) -> Result<ValueStoreKey> {
        let hash = self.hash_factory.hash(bytes);
        let probe = {
            let read = txn.as_read();
            let meta_table = self.meta_table;
            probe_bucket(
                read,
                self.value_table,
                &hash.to_be_bytes(),
                self.max_unique_id,
                |key, stored| {
                    if stored != bytes {
                        return Ok(false);
                    }
                    match read.get(meta_table, key)? {
                        Some(meta) => Ok(read_type_id(meta)? == type_id),
                        None => Ok(false),
                    }
                },
            )?
        };
        match probe {
            Probe::Found(unique_id) => {
                let key = ValueStoreKey::new(hash, unique_id);
                let raw = key.to_bytes();
                let meta = txn
                    .get(self.meta_table, &raw)?
                    .ok_or_else(|| self.missing(&key))?;
                let bumped = clone_and_increment_ref_count(meta)?;
                txn.put(self.meta_table, &raw, &bumped)?;
                Ok(key)
            }
            Probe::Free(unique_id) => {
                if unique_id > 0 {
                    debug!(target: "planb::lookup", table = %self.name, hash, unique_id, "Hash collision");
                }
                let key = ValueStoreKey::new(hash, unique_id);
                let raw = key.to_bytes();
                txn.put(self.value_table, &raw, bytes)?;
                txn.put(self.meta_table, &raw, &ValueStoreMeta::new(type_id, 1).encode())?;
                Ok(key)
            }
            Probe::Full => Err(Error::HashCollisionExhausted {
                table: self.name.clone(),
                hash,
            }),
        }
    }

    /// Value bytes for `key`
    pub fn get<'t>(&self, txn: &'t dyn ReadTxn, key: &ValueStoreKey) -> Result<Option<&'t [u8]>> {
        txn.get(self.value_table, &key.to_bytes())
    }

    /// Metadata for `key`
    pub fn get_meta(&self, txn: &dyn ReadTxn, key: &ValueStoreKey) -> Result<Option<ValueStoreMeta>> {
        txn.get(self.meta_table, &key.to_bytes())?
            .map(ValueStoreMeta::decode)
            .transpose()
    }

    /// Drop one reference to `key`, deleting the value with the last one
    pub fn dereference(&self, txn: &mut dyn WriteTxn, key: &ValueStoreKey) -> Result<Dereferenced> {
        let raw = key.to_bytes();
        let meta = txn
            .get(self.meta_table, &raw)?
            .ok_or_else(|| self.missing(key))?;
        let lowered = clone_and_decrement_ref_count(meta)?;
        match read_ref_count(&lowered)? {
            0 => {
                txn.delete(self.value_table, &raw)?;
                txn.delete(self.meta_table, &raw)?;
                Ok(Dereferenced::Deleted)
            }
            remaining => {
                txn.put(self.meta_table, &raw, &lowered)?;
                Ok(Dereferenced::Decremented(remaining))
            }
        }
    }

    /// Number of distinct stored values
    pub fn entry_count(&self, txn: &dyn ReadTxn) -> Result<u64> {
        txn.entry_count(self.value_table)
    }

    fn missing(&self, key: &ValueStoreKey) -> Error {
        Error::LookupMissing {
            table: self.name.clone(),
            id: key.to_bytes().to_vec(),
        }
    }
}
