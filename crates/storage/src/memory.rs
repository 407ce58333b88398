//! MemoryEnv: in-memory ordered transactional engine
//!
//! Implements the storage contract with:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` per named table for ordered iteration
//! - `parking_lot::Mutex` admitting one write transaction at a time
//! - `parking_lot::RwLock<Arc<Tables>>` holding the committed state
//!
//! # Design Notes
//!
//! - **Snapshot isolation**: a read transaction holds an `Arc` of the
//!   committed tables; commits publish a new `Arc` and never touch old ones
//! - **Single writer**: `begin_write` blocks until the previous writer ends
//! - **All-or-nothing**: a write transaction works on a private copy; dropping
//!   it without `commit` discards every change
//! - **Key ceiling**: `put` rejects keys longer than `max_key_length`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::trace;

use planb_core::{Error, Result, DEFAULT_MAX_KEY_LENGTH};

use crate::range::KeyRange;
use crate::snapshot::{MemoryReadTxn, Tables};
use crate::traits::{KvIter, ReadTxn, TableId, TableRegistry, WriteTxn};

/// In-memory environment of named ordered tables
#[derive(Debug)]
pub struct MemoryEnv {
    /// Table names, indexed by `TableId`
    names: RwLock<Vec<String>>,
    /// Last committed state
    committed: RwLock<Arc<Tables>>,
    /// Held for the lifetime of a write transaction
    writer: Mutex<()>,
    /// Key ceiling enforced on put
    max_key_length: usize,
    /// Number of committed write transactions
    commits: AtomicU64,
}

impl MemoryEnv {
    /// Create an empty environment with the default key ceiling
    pub fn new() -> Self {
        Self::with_max_key_length(DEFAULT_MAX_KEY_LENGTH)
    }

    /// Create an empty environment with a custom key ceiling
    pub fn with_max_key_length(max_key_length: usize) -> Self {
        Self {
            names: RwLock::new(Vec::new()),
            committed: RwLock::new(Arc::new(Tables::default())),
            writer: Mutex::new(()),
            max_key_length,
            commits: AtomicU64::new(0),
        }
    }

    /// Take a snapshot of committed state
    pub fn begin_read(&self) -> MemoryReadTxn {
        MemoryReadTxn::new(Arc::clone(&self.committed.read()))
    }

    /// Start the write transaction, waiting for any current writer
    pub fn begin_write(&self) -> MemoryWriteTxn<'_> {
        let guard = self.writer.lock();
        // Read committed state only once the writer lock is held so no commit
        // can land between the copy and the start of this transaction.
        let working = Tables::clone(&self.committed.read());
        MemoryWriteTxn {
            env: self,
            _guard: guard,
            working,
            changes: 0,
        }
    }

    /// Run `f` against a fresh snapshot
    pub fn read<R>(&self, f: impl FnOnce(&MemoryReadTxn) -> Result<R>) -> Result<R> {
        let txn = self.begin_read();
        f(&txn)
    }

    /// Run `f` in a write transaction, committing on `Ok` and aborting on `Err`
    pub fn write<R>(&self, f: impl FnOnce(&mut MemoryWriteTxn<'_>) -> Result<R>) -> Result<R> {
        let mut txn = self.begin_write();
        let result = f(&mut txn)?;
        txn.commit();
        Ok(result)
    }

    /// Number of committed write transactions so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Default for MemoryEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry for MemoryEnv {
    fn open_table(&self, name: &str) -> TableId {
        let mut names = self.names.write();
        if let Some(pos) = names.iter().position(|n| n == name) {
            return TableId(pos as u32);
        }
        names.push(name.to_string());
        TableId((names.len() - 1) as u32)
    }

    fn table_name(&self, table: TableId) -> String {
        self.names
            .read()
            .get(table.index())
            .cloned()
            .unwrap_or_else(|| table.to_string())
    }

    fn max_key_length(&self) -> usize {
        self.max_key_length
    }
}

/// The environment's single write transaction
pub struct MemoryWriteTxn<'env> {
    env: &'env MemoryEnv,
    _guard: MutexGuard<'env, ()>,
    working: Tables,
    changes: u64,
}

impl MemoryWriteTxn<'_> {
    /// Publish every change made by this transaction
    pub fn commit(self) {
        trace!(target: "planb::storage", changes = self.changes, "Write transaction committed");
        *self.env.committed.write() = Arc::new(self.working);
        self.env.commits.fetch_add(1, Ordering::SeqCst);
    }

    /// Discard every change made by this transaction
    pub fn abort(self) {
        trace!(target: "planb::storage", changes = self.changes, "Write transaction aborted");
    }

    /// Number of puts and deletes applied so far
    pub fn change_count(&self) -> u64 {
        self.changes
    }
}

impl ReadTxn for MemoryWriteTxn<'_> {
    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<&[u8]>> {
        Ok(self.working.get(table, key))
    }

    fn scan(&self, table: TableId, range: KeyRange) -> Result<KvIter<'_>> {
        Ok(self.working.scan(table, range))
    }

    fn entry_count(&self, table: TableId) -> Result<u64> {
        Ok(self.working.entry_count(table))
    }
}

impl WriteTxn for MemoryWriteTxn<'_> {
    fn put(&mut self, table: TableId, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > self.env.max_key_length {
            return Err(Error::KeyTooLong {
                actual: key.len(),
                max: self.env.max_key_length,
            });
        }
        self.working
            .table_mut(table)
            .insert(key.to_vec(), value.to_vec());
        self.changes += 1;
        Ok(())
    }

    fn delete(&mut self, table: TableId, key: &[u8]) -> Result<bool> {
        let removed = self.working.table_mut(table).remove(key).is_some();
        if removed {
            self.changes += 1;
        }
        Ok(removed)
    }

    fn delete_range(&mut self, table: TableId, range: KeyRange) -> Result<u64> {
        let keys: Vec<Vec<u8>> = self
            .working
            .scan(table, range)
            .map(|(k, _)| k.to_vec())
            .collect();
        let t = self.working.table_mut(table);
        for key in &keys {
            t.remove(key.as_slice());
        }
        self.changes += keys.len() as u64;
        Ok(keys.len() as u64)
    }

    fn as_read(&self) -> &dyn ReadTxn {
        self
    }
}
