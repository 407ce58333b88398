use std::sync::Arc;

use planb_core::{Result, Session};
use planb_storage::{ReadTxn, WriteTxn};

use super::{prefix_val, split_key, val_session, write_times, SessionSerde};
use crate::bytes::ByteReader;
use crate::gc::{UsedLookups, UsedLookupsRecorder};
use crate::lookup::UidLookupDb;
use crate::time::TimeSerde;
use crate::val::{encode, read_tagged};

/// `[uid][start][end]`, the subject interned in a sequential table
#[derive(Debug, Clone)]
pub struct UidLookupSessionSerde {
    uid: UidLookupDb,
    time: TimeSerde,
}

impl UidLookupSessionSerde {
    /// Serde interning subjects in `uid`
    pub fn new(uid: UidLookupDb, time: TimeSerde) -> Self {
        UidLookupSessionSerde { uid, time }
    }
}

impl SessionSerde for UidLookupSessionSerde {
    fn write<'b>(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        let id = self.uid.put(txn, &encode(prefix_val(session)?))?;
        buf.clear();
        self.uid.write_id(buf, id)?;
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }

    fn read(&self, txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        let mut reader = ByteReader::new(subject);
        let id = self.uid.read_id(&mut reader)?;
        reader.finish()?;
        let val = read_tagged(self.uid.require_value(txn, id)?)?;
        Ok(val_session(val, start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        let Some(id) = self.uid.get_id(txn, &encode(prefix_val(session)?))? else {
            return Ok(None);
        };
        buf.clear();
        self.uid.write_id(buf, id)?;
        write_times(&self.time, buf, session)?;
        Ok(Some(buf.as_slice()))
    }

    fn uses_lookup(&self, _key: &[u8]) -> bool {
        true
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(UidLookupRecorder {
            uid: self.uid.clone(),
        })
    }

    fn time_serde(&self) -> &TimeSerde {
        &self.time
    }
}

/// Marks the uid at the start of each key
#[derive(Debug, Clone)]
pub struct UidLookupRecorder {
    uid: UidLookupDb,
}

impl UsedLookupsRecorder for UidLookupRecorder {
    fn record_used(&self, _txn: &dyn ReadTxn, key: &[u8], used: &mut UsedLookups) -> Result<()> {
        used.mark_uid(self.uid.read_id(&mut ByteReader::new(key))?);
        Ok(())
    }

    fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &UsedLookups) -> Result<u64> {
        self.uid.delete_unused(txn, used.uids())
    }
}
