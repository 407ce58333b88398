use std::sync::Arc;

use planb_core::{Result, Session};
use planb_storage::{ReadTxn, WriteTxn};

use super::{prefix_val, split_key, val_session, write_times, SessionSerde};
use crate::bytes::ByteReader;
use crate::gc::{UsedLookups, UsedLookupsRecorder};
use crate::lookup::HashLookupDb;
use crate::time::TimeSerde;
use crate::val::{encode, read_tagged};

/// `[hash][unique id][start][end]`, the subject interned in a hash table
#[derive(Debug, Clone)]
pub struct HashLookupSessionSerde {
    hash: HashLookupDb,
    time: TimeSerde,
}

impl HashLookupSessionSerde {
    /// Serde interning subjects in `hash`
    pub fn new(hash: HashLookupDb, time: TimeSerde) -> Self {
        HashLookupSessionSerde { hash, time }
    }
}

impl SessionSerde for HashLookupSessionSerde {
    fn write<'b>(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        let id = self.hash.put(txn, &encode(prefix_val(session)?))?;
        buf.clear();
        self.hash.write_id(buf, &id);
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }

    fn read(&self, txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        let mut reader = ByteReader::new(subject);
        let id = self.hash.read_id(&mut reader)?;
        reader.finish()?;
        let val = read_tagged(self.hash.require_value(txn, &id)?)?;
        Ok(val_session(val, start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        let Some(id) = self.hash.get_id(txn, &encode(prefix_val(session)?))? else {
            return Ok(None);
        };
        buf.clear();
        self.hash.write_id(buf, &id);
        write_times(&self.time, buf, session)?;
        Ok(Some(buf.as_slice()))
    }

    fn uses_lookup(&self, _key: &[u8]) -> bool {
        true
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(HashLookupRecorder {
            hash: self.hash.clone(),
        })
    }

    fn time_serde(&self) -> &TimeSerde {
        &self.time
    }
}

/// Marks the hash id at the start of each key
#[derive(Debug, Clone)]
pub struct HashLookupRecorder {
    hash: HashLookupDb,
}

impl UsedLookupsRecorder for HashLookupRecorder {
    fn record_used(&self, _txn: &dyn ReadTxn, key: &[u8], used: &mut UsedLookups) -> Result<()> {
        used.mark_hash(self.hash.read_id(&mut ByteReader::new(key))?);
        Ok(())
    }

    fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &UsedLookups) -> Result<u64> {
        self.hash.delete_unused(txn, used.hashes())
    }
}
