//! Tiered subject storage for values of unknown size
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────┬───────┬─────┐
//! │ Tier (1 byte)│ tagged value | uid | hash id      │ Start │ End │
//! └──────────────┴───────────────────────────────────┴───────┴─────┘
//! ```
//!
//! The tier is chosen from the length `L` of the tagged encoding:
//! `L <= uid threshold` is stored inline, `L <= hash threshold` is interned
//! sequentially, anything longer is interned by hash.

use std::sync::Arc;

use planb_core::{Error, Result, Session};
use planb_storage::{ReadTxn, WriteTxn};

use super::{prefix_val, split_key, val_session, write_times, SessionSerde};
use crate::bytes::ByteReader;
use crate::gc::{UsedLookups, UsedLookupsRecorder};
use crate::lookup::{HashLookupDb, UidLookupDb};
use crate::time::TimeSerde;
use crate::val::{encode, read_tagged};

/// How the subject of a variable key is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VariableTier {
    /// Tagged value inline
    Direct = 0,
    /// Sequential id
    UidLookup = 1,
    /// Hash id
    HashLookup = 2,
}

impl VariableTier {
    /// Tier byte
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Parse a tier byte
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(VariableTier::Direct),
            1 => Ok(VariableTier::UidLookup),
            2 => Ok(VariableTier::HashLookup),
            other => Err(Error::corruption(format!("unknown variable key tier {other}"))),
        }
    }

    /// Tier of an encoded key
    pub fn of_key(key: &[u8]) -> Result<Self> {
        match key.first() {
            Some(id) => Self::from_id(*id),
            None => Err(Error::corruption("empty variable key")),
        }
    }
}

/// Inline, sequential or hashed subject depending on encoded size
#[derive(Debug, Clone)]
pub struct VariableSessionSerde {
    uid: UidLookupDb,
    hash: HashLookupDb,
    uid_lookup_threshold: usize,
    hash_lookup_threshold: usize,
    time: TimeSerde,
}

impl VariableSessionSerde {
    /// Serde with the given lookup tables and thresholds
    pub fn new(
        uid: UidLookupDb,
        hash: HashLookupDb,
        uid_lookup_threshold: usize,
        hash_lookup_threshold: usize,
        time: TimeSerde,
    ) -> Self {
        VariableSessionSerde {
            uid,
            hash,
            uid_lookup_threshold,
            hash_lookup_threshold,
            time,
        }
    }

    /// Tier used for a tagged encoding of `len` bytes
    pub fn tier_for(&self, len: usize) -> VariableTier {
        if len <= self.uid_lookup_threshold {
            VariableTier::Direct
        } else if len <= self.hash_lookup_threshold {
            VariableTier::UidLookup
        } else {
            VariableTier::HashLookup
        }
    }
}

impl SessionSerde for VariableSessionSerde {
    fn write<'b>(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        let tagged = encode(prefix_val(session)?);
        let tier = self.tier_for(tagged.len());
        buf.clear();
        buf.push(tier.id());
        match tier {
            VariableTier::Direct => buf.extend_from_slice(&tagged),
            VariableTier::UidLookup => {
                let id = self.uid.put(txn, &tagged)?;
                self.uid.write_id(buf, id)?;
            }
            VariableTier::HashLookup => {
                let id = self.hash.put(txn, &tagged)?;
                self.hash.write_id(buf, &id);
            }
        }
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }

    fn read(&self, txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        let tier = VariableTier::of_key(subject)?;
        let mut reader = ByteReader::new(&subject[1..]);
        let val = match tier {
            VariableTier::Direct => read_tagged(reader.rest())?,
            VariableTier::UidLookup => {
                let id = self.uid.read_id(&mut reader)?;
                reader.finish()?;
                read_tagged(self.uid.require_value(txn, id)?)?
            }
            VariableTier::HashLookup => {
                let id = self.hash.read_id(&mut reader)?;
                reader.finish()?;
                read_tagged(self.hash.require_value(txn, &id)?)?
            }
        };
        Ok(val_session(val, start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        let tagged = encode(prefix_val(session)?);
        let tier = self.tier_for(tagged.len());
        buf.clear();
        buf.push(tier.id());
        match tier {
            VariableTier::Direct => buf.extend_from_slice(&tagged),
            VariableTier::UidLookup => match self.uid.get_id(txn, &tagged)? {
                Some(id) => self.uid.write_id(buf, id)?,
                None => return Ok(None),
            },
            VariableTier::HashLookup => match self.hash.get_id(txn, &tagged)? {
                Some(id) => self.hash.write_id(buf, &id),
                None => return Ok(None),
            },
        }
        write_times(&self.time, buf, session)?;
        Ok(Some(buf.as_slice()))
    }

    fn uses_lookup(&self, key: &[u8]) -> bool {
        !matches!(VariableTier::of_key(key), Ok(VariableTier::Direct))
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(VariableRecorder {
            uid: self.uid.clone(),
            hash: self.hash.clone(),
        })
    }

    fn time_serde(&self) -> &TimeSerde {
        &self.time
    }
}

/// Marks whichever lookup the tier byte of a key points at
#[derive(Debug, Clone)]
pub struct VariableRecorder {
    uid: UidLookupDb,
    hash: HashLookupDb,
}

impl UsedLookupsRecorder for VariableRecorder {
    fn record_used(&self, _txn: &dyn ReadTxn, key: &[u8], used: &mut UsedLookups) -> Result<()> {
        let mut reader = ByteReader::new(key.get(1..).unwrap_or_default());
        match VariableTier::of_key(key)? {
            VariableTier::Direct => {}
            VariableTier::UidLookup => used.mark_uid(self.uid.read_id(&mut reader)?),
            VariableTier::HashLookup => used.mark_hash(self.hash.read_id(&mut reader)?),
        }
        Ok(())
    }

    fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &UsedLookups) -> Result<u64> {
        let uids = self.uid.delete_unused(txn, used.uids())?;
        let hashes = self.hash.delete_unused(txn, used.hashes())?;
        Ok(uids + hashes)
    }

    fn uses_lookup(&self, key: &[u8]) -> bool {
        !matches!(VariableTier::of_key(key), Ok(VariableTier::Direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::LongHashFactory;
    use crate::val::tagged_len;
    use chrono::{TimeZone, Utc};
    use planb_core::{KeyPrefix, TemporalPrecision, Val};
    use planb_storage::MemoryEnv;

    fn serde(env: &MemoryEnv) -> VariableSessionSerde {
        VariableSessionSerde::new(
            UidLookupDb::new(env, "key", 4).unwrap(),
            HashLookupDb::new(env, "key", Arc::new(LongHashFactory)),
            32,
            256,
            TimeSerde::new(TemporalPrecision::Millisecond),
        )
    }

    fn session(val: impl Into<Val>) -> Session {
        Session::new(
            KeyPrefix::val(val),
            Utc.timestamp_millis_opt(5).unwrap(),
            Utc.timestamp_millis_opt(6).unwrap(),
        )
        .unwrap()
    }

    /// A string whose tagged encoding is exactly `len` bytes
    fn string_of_tagged_len(len: usize) -> Val {
        let val = Val::String("s".repeat(len - 1));
        assert_eq!(tagged_len(&val), len);
        val
    }

    fn write(env: &MemoryEnv, serde: &VariableSessionSerde, session: &Session) -> Vec<u8> {
        let mut buf = Vec::new();
        env.write(|txn| Ok(serde.write(txn, session, &mut buf)?.to_vec()))
            .unwrap()
    }

    #[test]
    fn test_threshold_boundaries() {
        let env = MemoryEnv::new();
        let serde = serde(&env);
        let cases = [
            (32, VariableTier::Direct),
            (33, VariableTier::UidLookup),
            (256, VariableTier::UidLookup),
            (257, VariableTier::HashLookup),
        ];
        for (len, tier) in cases {
            let s = session(string_of_tagged_len(len));
            let key = write(&env, &serde, &s);
            assert_eq!(VariableTier::of_key(&key).unwrap(), tier, "len {len}");
            assert_eq!(serde.uses_lookup(&key), tier != VariableTier::Direct);
            assert_eq!(serde.read(&env.begin_read(), &key).unwrap(), s);
        }
    }

    #[test]
    fn test_scalars_are_direct() {
        let env = MemoryEnv::new();
        let serde = serde(&env);
        let key = write(&env, &serde, &session(42i64));
        // tier + type + 8 byte long + 16 byte suffix
        assert_eq!(key.len(), 1 + 1 + 8 + 16);
        assert!(!serde.uses_lookup(&key));
    }

    #[test]
    fn test_probe_matches_write() {
        let env = MemoryEnv::new();
        let serde = serde(&env);
        let mut buf = Vec::new();
        for len in [10, 100, 1000] {
            let s = session(string_of_tagged_len(len));
            assert!(
                len <= 32
                    || serde
                        .to_buffer_for_get(&env.begin_read(), &s, &mut buf)
                        .unwrap()
                        .is_none()
            );
            let key = write(&env, &serde, &s);
            let probe = serde
                .to_buffer_for_get(&env.begin_read(), &s, &mut buf)
                .unwrap()
                .map(|k| k.to_vec());
            assert_eq!(probe, Some(key));
        }
    }

    #[test]
    fn test_recorder_marks_by_tier() {
        let env = MemoryEnv::new();
        let serde = serde(&env);
        let direct = write(&env, &serde, &session("small"));
        let uid = write(&env, &serde, &session(string_of_tagged_len(100)));
        let hash = write(&env, &serde, &session(string_of_tagged_len(300)));

        let recorder = serde.used_lookups_recorder();
        assert!(!recorder.uses_lookup(&direct));
        assert!(recorder.uses_lookup(&uid));
        assert!(recorder.uses_lookup(&hash));
        let txn = env.begin_read();
        let mut used = UsedLookups::new();
        for key in [&direct, &uid, &hash] {
            recorder.record_used(&txn, key, &mut used).unwrap();
        }
        assert_eq!(used.uids().len(), 1);
        assert_eq!(used.hashes().len(), 1);
    }

    #[test]
    fn test_unknown_tier() {
        let env = MemoryEnv::new();
        let serde = serde(&env);
        let mut key = write(&env, &serde, &session(1i32));
        key[0] = 9;
        assert!(matches!(
            serde.read(&env.begin_read(), &key),
            Err(Error::Corruption(_))
        ));
    }
}
