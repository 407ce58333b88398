//! SessionDb: the session/state store
//!
//! One data table maps encoded session keys to the instant the session was
//! inserted:
//!
//! ```text
//! ┌──────────────────────────┬───────┬─────┐      ┌──────────────────────┐
//! │ Subject (key serde)      │ Start │ End │  ->  │ Insert time (i64 ms) │
//! └──────────────────────────┴───────┴─────┘      └──────────────────────┘
//! ```
//!
//! The time suffix of every key is fixed-width and sorts chronologically, so
//! all sessions of one subject are ordered by `(start, end)`. State queries
//! and condensing work on the raw suffix without resolving lookups; only the
//! subject bytes ever go through the key serde.
//!
//! # Retention
//!
//! [`SessionDb::delete_old_data`] removes expired sessions and, in the same
//! write transaction, marks the lookups surviving keys use and sweeps the
//! rest. [`SessionDb::collect_garbage`] runs the sweep on its own.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, TimeZone, Utc};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use planb_codec::{
    create_key_serde, ByteReader, GarbageCollector, GcStats, SessionSerde, TimeSerde, UsedLookups,
};
use planb_core::{Error, KeyPrefix, Result, Session, SessionSettings};
use planb_storage::{KeyRange, MemoryEnv, ReadTxn, TableId, TableRegistry, WriteTxn};

/// Name of the table holding session keys
pub const SESSION_TABLE_NAME: &str = "session";

/// Width of the stored insert time
const VALUE_LEN: usize = 8;

/// Store of sessions keyed by subject and time range
#[derive(Debug)]
pub struct SessionDb {
    env: Arc<MemoryEnv>,
    data: TableId,
    serde: Box<dyn SessionSerde>,
    settings: SessionSettings,
    gc: GarbageCollector,
}

impl SessionDb {
    /// Create a store in a fresh environment sized to the settings' key ceiling
    pub fn create(settings: SessionSettings) -> Result<Self> {
        let env = Arc::new(MemoryEnv::with_max_key_length(settings.max_key_length));
        Self::open(env, settings)
    }

    /// Open a store over the tables of `env`
    pub fn open(env: Arc<MemoryEnv>, settings: SessionSettings) -> Result<Self> {
        if env.max_key_length() < settings.max_key_length {
            return Err(Error::InvalidConfig(format!(
                "max_key_length {} exceeds the environment ceiling {}",
                settings.max_key_length,
                env.max_key_length()
            )));
        }
        let serde = create_key_serde(&settings, env.as_ref())?;
        Ok(Self::with_serde(env, settings, serde))
    }

    /// Open a store with a prebuilt key serde
    ///
    /// The serde must have been built from `settings` against `env`.
    pub fn with_serde(
        env: Arc<MemoryEnv>,
        settings: SessionSettings,
        serde: Box<dyn SessionSerde>,
    ) -> Self {
        let data = env.open_table(SESSION_TABLE_NAME);
        SessionDb {
            env,
            data,
            serde,
            settings,
            gc: GarbageCollector::new(),
        }
    }

    /// Underlying environment
    pub fn env(&self) -> &Arc<MemoryEnv> {
        &self.env
    }

    /// Settings the store was opened with
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Key codec
    pub fn serde(&self) -> &dyn SessionSerde {
        self.serde.as_ref()
    }

    /// Data table
    pub fn table(&self) -> TableId {
        self.data
    }

    /// Garbage collector driving this store's sweeps
    pub fn garbage_collector(&self) -> &GarbageCollector {
        &self.gc
    }

    /// `session` as this store holds it, bounds truncated to the key precision
    ///
    /// Reads return this form; `get` and `insert` accept either.
    pub fn truncate(&self, session: &Session) -> Result<Session> {
        self.serde.time_serde().truncate_session(session)
    }

    /// Insert one session, recording the current time as its insert time
    pub fn insert(&self, session: &Session) -> Result<bool> {
        self.insert_at(session, Utc::now())
    }

    /// Insert one session with an explicit insert time
    ///
    /// Returns whether anything was written: with `overwrite` disabled an
    /// existing key keeps its original value.
    pub fn insert_at(&self, session: &Session, inserted: DateTime<Utc>) -> Result<bool> {
        let mut buf = Vec::new();
        self.env
            .write(|txn| self.put_session(txn, session, inserted, &mut buf))
    }

    /// Insert many sessions in one write transaction, returning how many were written
    pub fn insert_all<'a>(&self, sessions: impl IntoIterator<Item = &'a Session>) -> Result<u64> {
        let inserted = Utc::now();
        let mut buf = Vec::new();
        self.env.write(|txn| {
            let mut written = 0u64;
            for session in sessions {
                if self.put_session(txn, session, inserted, &mut buf)? {
                    written += 1;
                }
            }
            Ok(written)
        })
    }

    fn put_session(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        inserted: DateTime<Utc>,
        buf: &mut Vec<u8>,
    ) -> Result<bool> {
        let key = self.serde.write(txn, session, buf)?;
        put_entry(txn, self.data, key, &encode_insert_time(inserted), self.settings.overwrite)
    }

    /// The stored session with exactly this subject and time range
    pub fn get(&self, session: &Session) -> Result<Option<Session>> {
        let txn = self.env.begin_read();
        let mut buf = Vec::new();
        let Some(key) = self.serde.to_buffer_for_get(&txn, session, &mut buf)? else {
            return Ok(None);
        };
        match txn.get(self.data, key)? {
            Some(_) => self.serde.read(&txn, key).map(Some),
            None => Ok(None),
        }
    }

    /// Insert time recorded for a stored session
    pub fn get_insert_time(&self, session: &Session) -> Result<Option<DateTime<Utc>>> {
        let txn = self.env.begin_read();
        let mut buf = Vec::new();
        let Some(key) = self.serde.to_buffer_for_get(&txn, session, &mut buf)? else {
            return Ok(None);
        };
        txn.get(self.data, key)?.map(decode_insert_time).transpose()
    }

    /// The session of `prefix` in force at `time`
    ///
    /// Scans backwards from `prefix ‖ time ‖ MAX` over sessions that started
    /// at or before `time`, keeping each one that still covers it, and stops
    /// at the first that ended before `time`. Of a run of overlapping
    /// covering sessions the earliest-starting one is returned. A session
    /// nested inside a longer one hides it once the nested one has ended;
    /// condensed histories never nest.
    pub fn get_state(&self, prefix: &KeyPrefix, time: DateTime<Utc>) -> Result<Option<Session>> {
        let txn = self.env.begin_read();
        let time_serde = self.serde.time_serde();
        let width = time_serde.size();
        let probe = Session::from_parts(prefix.clone(), time, time);
        let mut buf = Vec::new();
        let Some(key) = self.serde.to_buffer_for_get(&txn, &probe, &mut buf)? else {
            return Ok(None);
        };
        let subject_len = key.len() - 2 * width;
        let mut upper = key[..key.len() - width].to_vec();
        time_serde.write_max(&mut upper);
        let lower = key[..subject_len].to_vec();
        let time = time_serde.truncate(time)?;

        let mut found = None;
        for (key, _) in txn.scan(self.data, KeyRange::inclusive(&lower, &upper).reverse())? {
            // Keys of a longer subject sharing these leading bytes
            if key.len() != subject_len + 2 * width {
                continue;
            }
            let (_, end) = read_suffix(time_serde, &key[subject_len..])?;
            if end < time {
                break;
            }
            found = Some(key);
        }
        found.map(|key| self.serde.read(&txn, key)).transpose()
    }

    /// Every stored session in key order
    pub fn sessions(&self) -> Result<Vec<Session>> {
        let txn = self.env.begin_read();
        let sessions = txn
            .scan(self.data, KeyRange::all())?
            .map(|(key, _)| self.serde.read(&txn, key))
            .collect();
        sessions
    }

    /// Every stored session with its insert time
    pub fn entries(&self) -> Result<Vec<(Session, DateTime<Utc>)>> {
        let txn = self.env.begin_read();
        let entries = txn
            .scan(self.data, KeyRange::all())?
            .map(|(key, value)| Ok((self.serde.read(&txn, key)?, decode_insert_time(value)?)))
            .collect();
        entries
    }

    /// Number of stored sessions
    pub fn count(&self) -> Result<u64> {
        self.env.read(|txn| txn.entry_count(self.data))
    }

    /// Merge overlapping or touching sessions of each subject that start before `before`
    ///
    /// A merged session spans the earliest start to the latest end of its
    /// run and keeps the latest insert time. Returns the number of keys
    /// removed.
    pub fn condense(&self, before: DateTime<Utc>) -> Result<u64> {
        let time_serde = *self.serde.time_serde();
        let width = time_serde.size();
        let before = time_serde.truncate(before)?;
        let removed = self.env.write(|txn| {
            let mut subjects: FxHashMap<Vec<u8>, Vec<(DateTime<Utc>, DateTime<Utc>, Vec<u8>, i64)>> =
                FxHashMap::default();
            for (key, value) in txn.scan(self.data, KeyRange::all())? {
                let (subject, suffix) = split_suffix(key, width)?;
                let (start, end) = read_suffix(&time_serde, suffix)?;
                if start >= before {
                    continue;
                }
                subjects.entry(subject.to_vec()).or_default().push((
                    start,
                    end,
                    key.to_vec(),
                    read_insert_millis(value)?,
                ));
            }

            let mut removed = 0u64;
            for (subject, sessions) in subjects {
                // Same subject bytes and sortable suffixes: already in (start, end) order
                let mut runs: Vec<Run> = Vec::new();
                for (start, end, key, inserted) in sessions {
                    match runs.last_mut() {
                        Some(run) if start <= run.end => {
                            run.end = run.end.max(end);
                            run.inserted = run.inserted.max(inserted);
                            run.keys.push(key);
                        }
                        _ => runs.push(Run {
                            start,
                            end,
                            inserted,
                            keys: vec![key],
                        }),
                    }
                }
                for run in runs.into_iter().filter(|run| run.keys.len() > 1) {
                    for key in &run.keys {
                        txn.delete(self.data, key)?;
                    }
                    let mut key = subject.clone();
                    time_serde.write(&mut key, run.start)?;
                    time_serde.write(&mut key, run.end)?;
                    let mut value = [0u8; VALUE_LEN];
                    BigEndian::write_i64(&mut value, run.inserted);
                    txn.put(self.data, &key, &value)?;
                    removed += run.keys.len() as u64 - 1;
                }
            }
            Ok(removed)
        })?;
        info!(target: "planb::session", removed, %before, "Condensed sessions");
        Ok(removed)
    }

    /// Delete sessions that ended (or were inserted) before `before`
    ///
    /// With `use_state_time` the session end decides, compared against
    /// `before` truncated to the key precision; otherwise the insert time.
    /// Lookups no longer referenced by any surviving key are swept in
    /// the same transaction. Returns the number of sessions deleted.
    pub fn delete_old_data(&self, before: DateTime<Utc>, use_state_time: bool) -> Result<u64> {
        let time_serde = *self.serde.time_serde();
        let width = time_serde.size();
        let before_millis = before.timestamp_millis();
        let before_state = time_serde.truncate(before)?;
        let recorder = self.serde.used_lookups_recorder();
        let (deleted, swept) = self.env.write(|txn| {
            let mut expired = Vec::new();
            let mut used = UsedLookups::new();
            {
                let read = txn.as_read();
                for (key, value) in read.scan(self.data, KeyRange::all())? {
                    let old = if use_state_time {
                        let (_, suffix) = split_suffix(key, width)?;
                        read_suffix(&time_serde, suffix)?.1 < before_state
                    } else {
                        read_insert_millis(value)? < before_millis
                    };
                    if old {
                        expired.push(key.to_vec());
                    } else if recorder.uses_lookup(key) {
                        recorder.record_used(read, key, &mut used)?;
                    }
                }
            }
            for key in &expired {
                txn.delete(self.data, key)?;
            }
            let swept = self.gc.sweep(txn, recorder.as_ref(), &used)?;
            Ok((expired.len() as u64, swept))
        })?;
        info!(
            target: "planb::session",
            deleted,
            swept,
            use_state_time,
            %before,
            "Deleted old sessions"
        );
        Ok(deleted)
    }

    /// Sweep lookup entries no stored key references
    pub fn collect_garbage(&self) -> Result<GcStats> {
        let recorder = self.serde.used_lookups_recorder();
        self.env
            .write(|txn| self.gc.run(txn, self.data, recorder.as_ref()))
    }

    /// Copy every session of `source` into this store
    ///
    /// Keys that reference lookups are decoded against the source tables and
    /// re-encoded against ours; the rest are copied byte for byte. Returns the
    /// number of entries written.
    pub fn merge(&self, source: &SessionDb) -> Result<u64> {
        if source.settings.key_schema != self.settings.key_schema {
            return Err(Error::InvalidConfig(
                "cannot merge session stores with different key schemas".to_string(),
            ));
        }
        let src = source.env.begin_read();
        let mut buf = Vec::new();
        let written = self.env.write(|txn| {
            let mut written = 0u64;
            for (key, value) in src.scan(source.data, KeyRange::all())? {
                let key = if source.serde.uses_lookup(key) {
                    let session = source.serde.read(&src, key)?;
                    self.serde.write(txn, &session, &mut buf)?
                } else {
                    key
                };
                if put_entry(txn, self.data, key, value, self.settings.overwrite)? {
                    written += 1;
                }
            }
            Ok(written)
        })?;
        debug!(target: "planb::session", written, "Merged session store");
        Ok(written)
    }
}

/// A run of mergeable sessions of one subject
struct Run {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    inserted: i64,
    keys: Vec<Vec<u8>>,
}

fn put_entry(
    txn: &mut dyn WriteTxn,
    table: TableId,
    key: &[u8],
    value: &[u8],
    overwrite: bool,
) -> Result<bool> {
    if !overwrite && txn.get(table, key)?.is_some() {
        return Ok(false);
    }
    txn.put(table, key, value)?;
    Ok(true)
}

fn split_suffix(key: &[u8], width: usize) -> Result<(&[u8], &[u8])> {
    key.len()
        .checked_sub(2 * width)
        .map(|at| key.split_at(at))
        .ok_or_else(|| Error::corruption(format!("session key of {} bytes has no time suffix", key.len())))
}

fn read_suffix(time_serde: &TimeSerde, suffix: &[u8]) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let mut reader = ByteReader::new(suffix);
    let start = time_serde.read(&mut reader)?;
    let end = time_serde.read(&mut reader)?;
    reader.finish()?;
    Ok((start, end))
}

fn encode_insert_time(time: DateTime<Utc>) -> [u8; VALUE_LEN] {
    let mut value = [0u8; VALUE_LEN];
    BigEndian::write_i64(&mut value, time.timestamp_millis());
    value
}

fn read_insert_millis(value: &[u8]) -> Result<i64> {
    if value.len() != VALUE_LEN {
        return Err(Error::corruption(format!(
            "session value of {} bytes, expected {VALUE_LEN}",
            value.len()
        )));
    }
    Ok(BigEndian::read_i64(value))
}

fn decode_insert_time(value: &[u8]) -> Result<DateTime<Utc>> {
    let millis = read_insert_millis(value)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::corruption(format!("insert time {millis}ms out of range")))
}
