//! Copy-on-write table sets and the read snapshot built on them
//!
//! A `Tables` value is a vector of `Arc`-shared ordered maps. Cloning it is a
//! shallow copy; a write transaction clones a table only the first time it
//! mutates it (`Arc::make_mut`). Committed state is published by swapping in
//! a new `Arc<Tables>`, so a reader holding the old one keeps a consistent
//! point-in-time view for as long as it needs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use planb_core::Result;

use crate::range::KeyRange;
use crate::traits::{KvIter, ReadTxn, TableId};

pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Every table of an environment at one point in time
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    tables: Vec<Arc<Table>>,
}

impl Tables {
    fn table(&self, table: TableId) -> Option<&Table> {
        self.tables.get(table.index()).map(|t| t.as_ref())
    }

    pub(crate) fn table_mut(&mut self, table: TableId) -> &mut Table {
        let index = table.index();
        while self.tables.len() <= index {
            self.tables.push(Arc::default());
        }
        Arc::make_mut(&mut self.tables[index])
    }

    pub(crate) fn get(&self, table: TableId, key: &[u8]) -> Option<&[u8]> {
        self.table(table)
            .and_then(|t| t.get(key))
            .map(|v| v.as_slice())
    }

    pub(crate) fn scan(&self, table: TableId, range: KeyRange) -> KvIter<'_> {
        let Some(t) = self.table(table) else {
            return Box::new(std::iter::empty());
        };
        if range.is_empty() {
            return Box::new(std::iter::empty());
        }
        let iter = t
            .range::<[u8], _>(range.as_slices())
            .map(|(k, v)| (k.as_slice(), v.as_slice()));
        if range.reverse {
            Box::new(iter.rev())
        } else {
            Box::new(iter)
        }
    }

    pub(crate) fn entry_count(&self, table: TableId) -> u64 {
        self.table(table).map_or(0, |t| t.len() as u64)
    }
}

/// A read transaction: an immutable snapshot of committed state
///
/// Writes committed after the snapshot was taken are not visible through it.
#[derive(Debug, Clone)]
pub struct MemoryReadTxn {
    snapshot: Arc<Tables>,
}

impl MemoryReadTxn {
    pub(crate) fn new(snapshot: Arc<Tables>) -> Self {
        MemoryReadTxn { snapshot }
    }
}

impl ReadTxn for MemoryReadTxn {
    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<&[u8]>> {
        Ok(self.snapshot.get(table, key))
    }

    fn scan(&self, table: TableId, range: KeyRange) -> Result<KvIter<'_>> {
        Ok(self.snapshot.scan(table, range))
    }

    fn entry_count(&self, table: TableId) -> Result<u64> {
        Ok(self.snapshot.entry_count(table))
    }
}
