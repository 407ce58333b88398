use std::sync::Arc;

use planb_core::{Error, Result, Session, ValType};
use planb_storage::{ReadTxn, WriteTxn};

use super::{prefix_val, split_key, val_session, write_times, SessionSerde};
use crate::gc::{NoOpRecorder, UsedLookupsRecorder};
use crate::time::TimeSerde;
use crate::val::{read_direct, write_direct};

/// `[fixed-width value][start][end]` for one scalar type
#[derive(Debug, Clone)]
pub struct ScalarSessionSerde {
    val_type: ValType,
    time: TimeSerde,
}

impl ScalarSessionSerde {
    /// Serde for subjects of `val_type`
    pub fn new(val_type: ValType, time: TimeSerde) -> Self {
        ScalarSessionSerde { val_type, time }
    }

    fn encode<'b>(&self, session: &Session, buf: &'b mut Vec<u8>) -> Result<&'b [u8]> {
        let val = prefix_val(session)?;
        if val.val_type() != self.val_type {
            return Err(Error::UnexpectedType {
                expected: self.val_type.name().to_string(),
                actual: val.val_type().name().to_string(),
            });
        }
        buf.clear();
        write_direct(buf, val);
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }
}

impl SessionSerde for ScalarSessionSerde {
    fn write<'b>(
        &self,
        _txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        self.encode(session, buf)
    }

    fn read(&self, _txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        Ok(val_session(read_direct(self.val_type, subject)?, start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        _txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        self.encode(session, buf).map(Some)
    }

    fn uses_lookup(&self, _key: &[u8]) -> bool {
        false
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(NoOpRecorder)
    }

    fn time_serde(&self) -> &TimeSerde {
        &self.time
    }
}
