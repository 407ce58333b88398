//! Session key serde strategies
//!
//! A session key is the encoded subject followed by a fixed-width
//! `[start][end]` time suffix:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┬──────────────┐
//! │ Subject (strategy specific)  │ Start        │ End          │
//! └──────────────────────────────┴──────────────┴──────────────┘
//! ```
//!
//! | Key type | Strategy | Subject |
//! |---|---|---|
//! | Boolean ... Date | [`ScalarSessionSerde`] | fixed-width value |
//! | String | [`LimitedStringSessionSerde`] | UTF-8, bounded by the key ceiling |
//! | UidLookup | [`UidLookupSessionSerde`] | sequential id |
//! | HashLookup | [`HashLookupSessionSerde`] | hash id |
//! | Variable | [`VariableSessionSerde`] | tier byte + direct value or id |
//! | Tags | [`TagsSessionSerde`] | tag-set id + one id per tag value |
//!
//! Encoding writes into a caller-owned scratch buffer and hands back a slice
//! of it; the slice is only valid until the buffer is next used.

mod hash_lookup;
mod limited_string;
mod simple;
mod tags;
mod uid_lookup;
mod variable;

pub use hash_lookup::{HashLookupRecorder, HashLookupSessionSerde};
pub use limited_string::LimitedStringSessionSerde;
pub use simple::ScalarSessionSerde;
pub use tags::{TagsRecorder, TagsSessionSerde};
pub use uid_lookup::{UidLookupRecorder, UidLookupSessionSerde};
pub use variable::{VariableRecorder, VariableSessionSerde, VariableTier};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use planb_core::{Error, KeyPrefix, KeyType, Result, Session, SessionSettings, Val, ValType};
use planb_storage::{ReadTxn, TableRegistry, WriteTxn};

use crate::bytes::ByteReader;
use crate::gc::UsedLookupsRecorder;
use crate::hash::{create_hash_factory, HashFactory};
use crate::lookup::{HashLookupDb, UidLookupDb};
use crate::time::TimeSerde;

/// Name lookup tables of a session store are created under
pub const KEY_LOOKUP_DB_NAME: &str = "key";

/// Encodes and decodes session keys
pub trait SessionSerde: Send + Sync + fmt::Debug {
    /// Encode the full key of `session` into `buf`, interning lookups as needed
    fn write<'b>(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]>;

    /// Decode a full key, resolving any lookups
    fn read(&self, txn: &dyn ReadTxn, key: &[u8]) -> Result<Session>;

    /// Encode the key of `session` without interning anything
    ///
    /// Returns `Ok(None)` when some part of the subject has never been
    /// interned, which means no key for it can exist.
    fn to_buffer_for_get<'b>(
        &self,
        txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>>;

    /// True if `key` references any lookup entry
    fn uses_lookup(&self, key: &[u8]) -> bool;

    /// Recorder marking the lookup entries this serde's keys reference
    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder>;

    /// Codec of the time suffix
    fn time_serde(&self) -> &TimeSerde;
}

/// Build the key serde for `settings`, opening its lookup tables in `env`
pub fn create_key_serde(
    settings: &SessionSettings,
    env: &dyn TableRegistry,
) -> Result<Box<dyn SessionSerde>> {
    create_key_serde_with_hash(
        settings,
        env,
        create_hash_factory(settings.key_schema.hash_length),
    )
}

/// As [`create_key_serde`], hashing with `hash_factory`
pub fn create_key_serde_with_hash(
    settings: &SessionSettings,
    env: &dyn TableRegistry,
    hash_factory: Arc<dyn HashFactory>,
) -> Result<Box<dyn SessionSerde>> {
    settings.validate()?;
    let schema = &settings.key_schema;
    let time = TimeSerde::new(schema.temporal_precision);
    let scalar = |val_type| -> Result<Box<dyn SessionSerde>> {
        Ok(Box::new(ScalarSessionSerde::new(val_type, time)))
    };
    match schema.key_type {
        KeyType::Boolean => scalar(ValType::Boolean),
        KeyType::Byte => scalar(ValType::Byte),
        KeyType::Short => scalar(ValType::Short),
        KeyType::Int => scalar(ValType::Int),
        KeyType::Long => scalar(ValType::Long),
        KeyType::Float => scalar(ValType::Float),
        KeyType::Double => scalar(ValType::Double),
        KeyType::Date => scalar(ValType::Date),
        KeyType::String => Ok(Box::new(LimitedStringSessionSerde::new(
            settings.max_key_length,
            time,
        ))),
        KeyType::UidLookup => Ok(Box::new(UidLookupSessionSerde::new(
            UidLookupDb::new(env, KEY_LOOKUP_DB_NAME, schema.uid_width)?,
            time,
        ))),
        KeyType::HashLookup => Ok(Box::new(HashLookupSessionSerde::new(
            HashLookupDb::new(env, KEY_LOOKUP_DB_NAME, hash_factory),
            time,
        ))),
        KeyType::Variable => Ok(Box::new(VariableSessionSerde::new(
            UidLookupDb::new(env, KEY_LOOKUP_DB_NAME, schema.uid_width)?,
            HashLookupDb::new(env, KEY_LOOKUP_DB_NAME, hash_factory),
            schema.uid_lookup_threshold,
            schema.hash_lookup_threshold,
            time,
        ))),
        KeyType::Tags => Ok(Box::new(TagsSessionSerde::new(
            UidLookupDb::new(env, KEY_LOOKUP_DB_NAME, schema.uid_width)?,
            time,
        ))),
    }
}

/// Append the `[start][end]` suffix of `session`
pub(crate) fn write_times(time: &TimeSerde, buf: &mut Vec<u8>, session: &Session) -> Result<()> {
    time.write(buf, session.start())?;
    time.write(buf, session.end())
}

/// Split `key` into subject bytes and decoded `(start, end)`
pub(crate) fn split_key<'k>(
    time: &TimeSerde,
    key: &'k [u8],
) -> Result<(&'k [u8], DateTime<Utc>, DateTime<Utc>)> {
    let suffix = time.size() * 2;
    if key.len() < suffix {
        return Err(Error::corruption(format!(
            "key of {} bytes is shorter than its {suffix} byte time suffix",
            key.len()
        )));
    }
    let (subject, times) = key.split_at(key.len() - suffix);
    let mut reader = ByteReader::new(times);
    let start = time.read(&mut reader)?;
    let end = time.read(&mut reader)?;
    Ok((subject, start, end))
}

/// The single-value subject of `session`
pub(crate) fn prefix_val(session: &Session) -> Result<&Val> {
    session.prefix().as_val().ok_or_else(|| Error::UnexpectedType {
        expected: "value".to_string(),
        actual: "tags".to_string(),
    })
}

/// Rebuild a session from a decoded subject value and times
pub(crate) fn val_session(val: Val, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
    Session::from_parts(KeyPrefix::Val(val), start, end)
}
