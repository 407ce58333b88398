//! Mark-and-sweep garbage collection of lookup entries
//!
//! Keys that reference lookup tables keep those entries alive. A run walks
//! every key of a data table, asks the key serde's recorder which lookup ids
//! the key references, then deletes every lookup entry nobody referenced.
//!
//! ## Phases
//!
//! `Idle → Marking → Sweeping → Idle`. Marking and sweeping both happen in
//! the caller's write transaction, so the marked view is consistent and no
//! other writer can add a reference between mark and sweep. Nothing is
//! published until the caller commits; dropping the transaction after a
//! failed run discards every delete.

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{info, warn};

use planb_core::Result;
use planb_storage::{KeyRange, ReadTxn, TableId, WriteTxn};

use crate::lookup::HashId;

/// Lookup ids referenced by live keys, gathered during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedLookups {
    uids: FxHashSet<u64>,
    hashes: FxHashSet<HashId>,
}

impl UsedLookups {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a sequential id
    pub fn mark_uid(&mut self, id: u64) {
        self.uids.insert(id);
    }

    /// Mark a hash id
    pub fn mark_hash(&mut self, id: HashId) {
        self.hashes.insert(id);
    }

    /// Marked sequential ids
    pub fn uids(&self) -> &FxHashSet<u64> {
        &self.uids
    }

    /// Marked hash ids
    pub fn hashes(&self) -> &FxHashSet<HashId> {
        &self.hashes
    }

    /// Number of marked ids
    pub fn len(&self) -> usize {
        self.uids.len() + self.hashes.len()
    }

    /// True if nothing was marked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Knows which lookup entries a key serde's keys reference
pub trait UsedLookupsRecorder: Send + Sync + fmt::Debug {
    /// Add every lookup id referenced by `key` to `used`
    fn record_used(&self, txn: &dyn ReadTxn, key: &[u8], used: &mut UsedLookups) -> Result<()>;

    /// Delete every lookup entry absent from `used`
    fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &UsedLookups) -> Result<u64>;

    /// False if `key` references no lookup and marking can skip it
    fn uses_lookup(&self, _key: &[u8]) -> bool {
        true
    }
}

/// Recorder for key types that never use lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRecorder;

impl UsedLookupsRecorder for NoOpRecorder {
    fn record_used(&self, _: &dyn ReadTxn, _: &[u8], _: &mut UsedLookups) -> Result<()> {
        Ok(())
    }

    fn delete_unused(&self, _: &mut dyn WriteTxn, _: &UsedLookups) -> Result<u64> {
        Ok(0)
    }

    fn uses_lookup(&self, _: &[u8]) -> bool {
        false
    }
}

/// Where a collector is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    /// No run in progress
    #[default]
    Idle,
    /// Walking live keys
    Marking,
    /// Deleting unreferenced entries
    Sweeping,
}

/// Counts from one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Data keys inspected
    pub keys_scanned: u64,
    /// Distinct lookup ids found in use
    pub marked: u64,
    /// Lookup entries deleted
    pub swept: u64,
}

/// Drives mark and sweep and reports its phase
#[derive(Debug, Default)]
pub struct GarbageCollector {
    phase: Mutex<GcPhase>,
}

/// Resets the phase to idle however the run ends
struct PhaseGuard<'a> {
    phase: &'a Mutex<GcPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Mutex<GcPhase>, next: GcPhase) -> Self {
        *phase.lock() = next;
        PhaseGuard { phase }
    }

    fn advance(&self, next: GcPhase) {
        *self.phase.lock() = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = GcPhase::Idle;
    }
}

impl GarbageCollector {
    /// A collector in the idle phase
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn phase(&self) -> GcPhase {
        *self.phase.lock()
    }

    /// Collect every lookup id referenced by keys of `table`
    pub fn mark(
        &self,
        txn: &dyn ReadTxn,
        table: TableId,
        recorder: &dyn UsedLookupsRecorder,
    ) -> Result<UsedLookups> {
        let _guard = PhaseGuard::enter(&self.phase, GcPhase::Marking);
        mark_keys(txn, table, recorder).map(|(used, _)| used)
    }

    /// Delete every lookup entry not in `used`
    pub fn sweep(
        &self,
        txn: &mut dyn WriteTxn,
        recorder: &dyn UsedLookupsRecorder,
        used: &UsedLookups,
    ) -> Result<u64> {
        let _guard = PhaseGuard::enter(&self.phase, GcPhase::Sweeping);
        recorder.delete_unused(txn, used)
    }

    /// Mark then sweep inside `txn`; the caller commits
    pub fn run(
        &self,
        txn: &mut dyn WriteTxn,
        table: TableId,
        recorder: &dyn UsedLookupsRecorder,
    ) -> Result<GcStats> {
        let guard = PhaseGuard::enter(&self.phase, GcPhase::Marking);
        let result = mark_keys(txn.as_read(), table, recorder).and_then(|(used, keys_scanned)| {
            guard.advance(GcPhase::Sweeping);
            let swept = recorder.delete_unused(txn, &used)?;
            Ok(GcStats {
                keys_scanned,
                marked: used.len() as u64,
                swept,
            })
        });
        match &result {
            Ok(stats) => info!(
                target: "planb::gc",
                keys_scanned = stats.keys_scanned,
                marked = stats.marked,
                swept = stats.swept,
                "Garbage collection finished"
            ),
            Err(e) => warn!(target: "planb::gc", error = %e, "Garbage collection aborted"),
        }
        result
    }
}

fn mark_keys(
    txn: &dyn ReadTxn,
    table: TableId,
    recorder: &dyn UsedLookupsRecorder,
) -> Result<(UsedLookups, u64)> {
    let mut used = UsedLookups::new();
    let mut scanned = 0u64;
    for (key, _) in txn.scan(table, KeyRange::all())? {
        scanned += 1;
        if recorder.uses_lookup(key) {
            recorder.record_used(txn, key, &mut used)?;
        }
    }
    Ok((used, scanned))
}
