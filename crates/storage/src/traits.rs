//! The ordered key/value contract consumed by the codec layer
//!
//! These traits describe the embedded transactional engine: named ordered
//! tables of byte keys to byte values, read transactions over a consistent
//! snapshot, and a single write transaction at a time that sees its own
//! uncommitted changes. The codec layer only ever talks to these traits, so
//! any engine with the same guarantees can sit underneath it.

use std::fmt;

use planb_core::Result;

use crate::range::KeyRange;

/// Handle to a named table inside an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) u32);

impl TableId {
    /// Raw index of the table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Borrowed key/value pair yielded by scans
pub type KvRef<'a> = (&'a [u8], &'a [u8]);

/// Iterator over a key range
pub type KvIter<'a> = Box<dyn Iterator<Item = KvRef<'a>> + 'a>;

/// Opens tables by name
pub trait TableRegistry {
    /// Open (creating if needed) the table called `name`
    fn open_table(&self, name: &str) -> TableId;

    /// Name the table was opened with
    fn table_name(&self, table: TableId) -> String;

    /// Maximum encoded key length accepted by `put`
    fn max_key_length(&self) -> usize;
}

/// Read access to a consistent view of the store
///
/// Returned slices borrow from the transaction and stay valid until it ends.
pub trait ReadTxn {
    /// Value stored under `key`
    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<&[u8]>>;

    /// Entries in `range`, in key order (or reverse key order)
    fn scan(&self, table: TableId, range: KeyRange) -> Result<KvIter<'_>>;

    /// Number of entries in the table
    fn entry_count(&self, table: TableId) -> Result<u64>;

    /// Last entry of the table in key order
    fn last(&self, table: TableId) -> Result<Option<KvRef<'_>>> {
        Ok(self.scan(table, KeyRange::all().reverse())?.next())
    }
}

/// The single writer
///
/// Changes are visible to this transaction immediately and to readers only
/// after commit. Dropping a write transaction without committing discards
/// every change it made.
pub trait WriteTxn: ReadTxn {
    /// Insert or replace `key`
    ///
    /// Fails with `KeyTooLong` if the key exceeds the engine ceiling.
    fn put(&mut self, table: TableId, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`, returning whether it was present
    fn delete(&mut self, table: TableId, key: &[u8]) -> Result<bool>;

    /// Remove every key in `range`, returning how many were removed
    fn delete_range(&mut self, table: TableId, range: KeyRange) -> Result<u64>;

    /// View this transaction through the read contract
    fn as_read(&self) -> &dyn ReadTxn;
}
