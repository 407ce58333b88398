//! Time suffix codec
//!
//! Every key ends with a fixed-width `[start][end]` pair written at the
//! configured precision. Signed fields have their sign bit flipped so byte
//! order is chronological order, which the state lookup relies on when it
//! scans backwards from `prefix ‖ time ‖ MAX`.

use chrono::{DateTime, TimeZone, Utc};

use planb_core::{Error, Result, Session, TemporalPrecision};

use crate::bytes::{write_sortable_i32, write_sortable_i64, ByteReader};

const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Encoder for one instant at a fixed precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSerde {
    precision: TemporalPrecision,
}

impl TimeSerde {
    /// Codec for `precision`
    pub fn new(precision: TemporalPrecision) -> Self {
        TimeSerde { precision }
    }

    /// Configured precision
    pub fn precision(&self) -> TemporalPrecision {
        self.precision
    }

    /// Encoded width of one instant
    #[inline]
    pub fn size(&self) -> usize {
        self.precision.width()
    }

    /// Append `time`, truncated to the configured precision
    pub fn write(&self, buf: &mut Vec<u8>, time: DateTime<Utc>) -> Result<()> {
        let millis = time.timestamp_millis();
        match self.precision {
            TemporalPrecision::Nanosecond => {
                write_sortable_i64(buf, time.timestamp());
                buf.extend_from_slice(&time.timestamp_subsec_nanos().to_be_bytes());
            }
            TemporalPrecision::Millisecond => write_sortable_i64(buf, millis),
            TemporalPrecision::Second => write_sortable_i64(buf, time.timestamp()),
            TemporalPrecision::Minute => write_sortable_i32(buf, narrow(millis, MILLIS_PER_MINUTE)?),
            TemporalPrecision::Hour => write_sortable_i32(buf, narrow(millis, MILLIS_PER_HOUR)?),
            TemporalPrecision::Day => write_sortable_i32(buf, narrow(millis, MILLIS_PER_DAY)?),
        }
        Ok(())
    }

    /// Append the largest encodable value, used as an inclusive upper bound
    pub fn write_max(&self, buf: &mut Vec<u8>) {
        buf.resize(buf.len() + self.size(), 0xFF);
    }

    /// Read one instant from `reader`
    pub fn read(&self, reader: &mut ByteReader<'_>) -> Result<DateTime<Utc>> {
        let time = match self.precision {
            TemporalPrecision::Nanosecond => {
                let secs = reader.sortable_i64()?;
                let nanos = reader.u32()?;
                Utc.timestamp_opt(secs, nanos).single()
            }
            TemporalPrecision::Millisecond => Utc.timestamp_millis_opt(reader.sortable_i64()?).single(),
            TemporalPrecision::Second => Utc.timestamp_opt(reader.sortable_i64()?, 0).single(),
            TemporalPrecision::Minute => from_units(reader.sortable_i32()?, MILLIS_PER_MINUTE),
            TemporalPrecision::Hour => from_units(reader.sortable_i32()?, MILLIS_PER_HOUR),
            TemporalPrecision::Day => from_units(reader.sortable_i32()?, MILLIS_PER_DAY),
        };
        time.ok_or_else(|| Error::corruption("time out of range"))
    }

    /// `time` as it will read back after encoding
    pub fn truncate(&self, time: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut buf = Vec::with_capacity(self.size());
        self.write(&mut buf, time)?;
        self.read(&mut ByteReader::new(&buf))
    }

    /// `session` with both bounds truncated, as a key decodes back
    ///
    /// Truncation is monotonic, so the range stays ordered.
    pub fn truncate_session(&self, session: &Session) -> Result<Session> {
        Ok(Session::from_parts(
            session.prefix().clone(),
            self.truncate(session.start())?,
            self.truncate(session.end())?,
        ))
    }
}

fn narrow(millis: i64, unit: i64) -> Result<i32> {
    i32::try_from(millis.div_euclid(unit))
        .map_err(|_| Error::corruption(format!("time {millis}ms out of range for precision")))
}

fn from_units(units: i32, unit: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(i64::from(units) * unit).single()
}
