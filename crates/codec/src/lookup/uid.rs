//! Sequential surrogate table
//!
//! Two tables back one logical lookup:
//!
//! ```text
//! {name}-uid        [id]     -> [value]
//! {name}-uid-index  [value]  -> [id]
//! ```
//!
//! Ids are fixed-width big-endian so the forward table iterates in
//! allocation order and its last key is the highest id handed out.

use rustc_hash::FxHashSet;
use tracing::debug;

use planb_core::{Error, Result};
use planb_storage::{KeyRange, ReadTxn, TableId, TableRegistry, WriteTxn};

use crate::bytes::{ByteReader, UnsignedBytes};

/// Value ↔ sequential id table
#[derive(Debug, Clone)]
pub struct UidLookupDb {
    name: String,
    id_table: TableId,
    index_table: TableId,
    uid: UnsignedBytes,
}

impl UidLookupDb {
    /// Open the table pair for `name` with ids of `width` bytes
    pub fn new(env: &dyn TableRegistry, name: &str, width: usize) -> Result<Self> {
        Ok(UidLookupDb {
            name: format!("{name}-uid"),
            id_table: env.open_table(&format!("{name}-uid")),
            index_table: env.open_table(&format!("{name}-uid-index")),
            uid: UnsignedBytes::new(width)?,
        })
    }

    /// Table name used in errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded width of an id
    #[inline]
    pub fn id_width(&self) -> usize {
        self.uid.width()
    }

    /// Append `id` at the configured width
    pub fn write_id(&self, buf: &mut Vec<u8>, id: u64) -> Result<()> {
        self.uid.write(buf, id)
    }

    /// Read one id from `reader`
    pub fn read_id(&self, reader: &mut ByteReader<'_>) -> Result<u64> {
        reader.uint(self.uid.width())
    }

    /// Id of `value`, allocating the next one if it is new
    pub fn put(&self, txn: &mut dyn WriteTxn, value: &[u8]) -> Result<u64> {
        if let Some(id) = self.get_id(txn.as_read(), value)? {
            return Ok(id);
        }
        let id = match txn.last(self.id_table)? {
            None => 0,
            Some((last, _)) => {
                let last = self.uid.read(last)?;
                if last >= self.uid.max_value() {
                    return Err(Error::UidExhausted {
                        table: self.name.clone(),
                        width: self.uid.width(),
                    });
                }
                last + 1
            }
        };
        let mut key = Vec::with_capacity(self.uid.width());
        self.uid.write(&mut key, id)?;
        // Index first: an oversized value fails before anything is written.
        txn.put(self.index_table, value, &key)?;
        txn.put(self.id_table, &key, value)?;
        debug!(target: "planb::lookup", table = %self.name, id, len = value.len(), "Allocated uid");
        Ok(id)
    }

    /// Id of `value` if it has one; never allocates
    pub fn get_id(&self, txn: &dyn ReadTxn, value: &[u8]) -> Result<Option<u64>> {
        txn.get(self.index_table, value)?
            .map(|id| self.uid.read(id))
            .transpose()
    }

    /// Value stored for `id`
    pub fn get_value<'t>(&self, txn: &'t dyn ReadTxn, id: u64) -> Result<Option<&'t [u8]>> {
        let mut key = Vec::with_capacity(self.uid.width());
        self.uid.write(&mut key, id)?;
        txn.get(self.id_table, &key)
    }

    /// Value stored for `id`, which must exist
    pub fn require_value<'t>(&self, txn: &'t dyn ReadTxn, id: u64) -> Result<&'t [u8]> {
        self.get_value(txn, id)?.ok_or_else(|| {
            let mut key = Vec::with_capacity(self.uid.width());
            let _ = self.uid.write(&mut key, id);
            Error::LookupMissing {
                table: self.name.clone(),
                id: key,
            }
        })
    }

    /// Number of allocated ids
    pub fn entry_count(&self, txn: &dyn ReadTxn) -> Result<u64> {
        txn.entry_count(self.id_table)
    }

    /// Delete every id not in `used`, returning how many were deleted
    pub fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &FxHashSet<u64>) -> Result<u64> {
        let mut unused = Vec::new();
        for (key, value) in txn.scan(self.id_table, KeyRange::all())? {
            if !used.contains(&self.uid.read(key)?) {
                unused.push((key.to_vec(), value.to_vec()));
            }
        }
        for (key, value) in &unused {
            txn.delete(self.index_table, value)?;
            txn.delete(self.id_table, key)?;
        }
        Ok(unused.len() as u64)
    }
}
