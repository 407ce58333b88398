use std::sync::Arc;

use planb_core::{Error, Result, Session, Val, ValType};
use planb_storage::{ReadTxn, WriteTxn};

use super::{prefix_val, split_key, val_session, write_times, SessionSerde};
use crate::gc::{NoOpRecorder, UsedLookupsRecorder};
use crate::time::TimeSerde;
use crate::val::read_direct;

/// `[utf8 bytes][start][end]`
///
/// Strings are stored inline, so their length is bounded by the engine key
/// ceiling minus the time suffix. Longer strings are rejected with
/// `KeyTooLong`; they are never truncated.
#[derive(Debug, Clone)]
pub struct LimitedStringSessionSerde {
    max_key_length: usize,
    time: TimeSerde,
}

impl LimitedStringSessionSerde {
    /// Serde for keys of at most `max_key_length` bytes
    pub fn new(max_key_length: usize, time: TimeSerde) -> Self {
        LimitedStringSessionSerde {
            max_key_length,
            time,
        }
    }

    /// Longest string that fits
    pub fn max_string_length(&self) -> usize {
        self.max_key_length.saturating_sub(self.time.size() * 2)
    }

    fn subject<'s>(&self, session: &'s Session) -> Result<&'s str> {
        match prefix_val(session)? {
            Val::String(s) => Ok(s),
            other => Err(Error::UnexpectedType {
                expected: ValType::String.name().to_string(),
                actual: other.val_type().name().to_string(),
            }),
        }
    }

    fn encode<'b>(&self, s: &str, session: &Session, buf: &'b mut Vec<u8>) -> Result<&'b [u8]> {
        buf.clear();
        buf.extend_from_slice(s.as_bytes());
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }
}

impl SessionSerde for LimitedStringSessionSerde {
    fn write<'b>(
        &self,
        _txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        let s = self.subject(session)?;
        if s.len() > self.max_string_length() {
            return Err(Error::KeyTooLong {
                actual: s.len() + self.time.size() * 2,
                max: self.max_key_length,
            });
        }
        self.encode(s, session, buf)
    }

    fn read(&self, _txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        Ok(val_session(read_direct(ValType::String, subject)?, start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        _txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        let s = self.subject(session)?;
        if s.len() > self.max_string_length() {
            // Could never have been written.
            return Ok(None);
        }
        self.encode(s, session, buf).map(Some)
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
