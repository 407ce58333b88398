//! Tag-set subjects
//!
//! Every part of a tag set is interned in one sequential table:
//!
//! ```text
//! tag name            "host"                  -> name id
//! tag-set             [name id][name id]...   -> tag-set id
//! tag value           tagged value            -> value id
//!
//! key                 [tag-set id][value id]...[start][end]
//! ```
//!
//! Tags are ordered by name before encoding, so equal tag sets produce equal
//! keys whatever order the tags were supplied in. Decoding resolves the
//! tag-set id to its name ids first, then pairs each name with the next
//! value id of the key.

use std::sync::Arc;

use smallvec::SmallVec;

use planb_core::{Error, KeyPrefix, Result, Session, Tag};
use planb_storage::{ReadTxn, WriteTxn};

use super::{split_key, write_times, SessionSerde};
use crate::bytes::ByteReader;
use crate::gc::{UsedLookups, UsedLookupsRecorder};
use crate::lookup::UidLookupDb;
use crate::time::TimeSerde;
use crate::val::{encode, read_tagged};

type SortedTags<'a> = SmallVec<[&'a Tag; 8]>;

/// `[tag-set id][value id]*[start][end]`
#[derive(Debug, Clone)]
pub struct TagsSessionSerde {
    uid: UidLookupDb,
    time: TimeSerde,
}

impl TagsSessionSerde {
    /// Serde interning names, tag sets and values in `uid`
    pub fn new(uid: UidLookupDb, time: TimeSerde) -> Self {
        TagsSessionSerde { uid, time }
    }
}

fn sorted_tags(session: &Session) -> Result<SortedTags<'_>> {
    let tags = session.prefix().as_tags().ok_or_else(|| Error::UnexpectedType {
        expected: "tags".to_string(),
        actual: "value".to_string(),
    })?;
    let mut sorted: SortedTags<'_> = tags.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(Error::DuplicateTag(pair[0].name.clone()));
    }
    Ok(sorted)
}

impl SessionSerde for TagsSessionSerde {
    fn write<'b>(
        &self,
        txn: &mut dyn WriteTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<&'b [u8]> {
        let tags = sorted_tags(session)?;
        let mut names = Vec::with_capacity(tags.len() * self.uid.id_width());
        for tag in &tags {
            let name_id = self.uid.put(txn, tag.name.as_bytes())?;
            self.uid.write_id(&mut names, name_id)?;
        }
        let tag_set_id = self.uid.put(txn, &names)?;
        let mut value_ids: SmallVec<[u64; 8]> = SmallVec::with_capacity(tags.len());
        for tag in &tags {
            value_ids.push(self.uid.put(txn, &encode(&tag.value))?);
        }

        buf.clear();
        self.uid.write_id(buf, tag_set_id)?;
        for id in value_ids {
            self.uid.write_id(buf, id)?;
        }
        write_times(&self.time, buf, session)?;
        Ok(buf.as_slice())
    }

    fn read(&self, txn: &dyn ReadTxn, key: &[u8]) -> Result<Session> {
        let (subject, start, end) = split_key(&self.time, key)?;
        let mut reader = ByteReader::new(subject);
        let tag_set_id = self.uid.read_id(&mut reader)?;
        let mut names = ByteReader::new(self.uid.require_value(txn, tag_set_id)?);
        let mut tags = Vec::with_capacity(names.remaining() / self.uid.id_width());
        while names.remaining() > 0 {
            let name_id = self.uid.read_id(&mut names)?;
            let name = std::str::from_utf8(self.uid.require_value(txn, name_id)?)
                .map_err(|e| Error::corruption(format!("invalid tag name: {e}")))?;
            let value_id = self.uid.read_id(&mut reader)?;
            let value = read_tagged(self.uid.require_value(txn, value_id)?)?;
            tags.push(Tag::new(name, value));
        }
        reader.finish()?;
        Ok(Session::from_parts(KeyPrefix::Tags(tags), start, end))
    }

    fn to_buffer_for_get<'b>(
        &self,
        txn: &dyn ReadTxn,
        session: &Session,
        buf: &'b mut Vec<u8>,
    ) -> Result<Option<&'b [u8]>> {
        let tags = sorted_tags(session)?;
        let mut names = Vec::with_capacity(tags.len() * self.uid.id_width());
        for tag in &tags {
            let Some(name_id) = self.uid.get_id(txn, tag.name.as_bytes())? else {
                return Ok(None);
            };
            self.uid.write_id(&mut names, name_id)?;
        }
        let Some(tag_set_id) = self.uid.get_id(txn, &names)? else {
            return Ok(None);
        };

        buf.clear();
        self.uid.write_id(buf, tag_set_id)?;
        for tag in &tags {
            let Some(value_id) = self.uid.get_id(txn, &encode(&tag.value))? else {
                return Ok(None);
            };
            self.uid.write_id(buf, value_id)?;
        }
        write_times(&self.time, buf, session)?;
        Ok(Some(buf.as_slice()))
    }

    fn uses_lookup(&self, _key: &[u8]) -> bool {
        true
    }

    fn used_lookups_recorder(&self) -> Arc<dyn UsedLookupsRecorder> {
        Arc::new(TagsRecorder {
            uid: self.uid.clone(),
        })
    }

    fn time_serde(&self) -> &TimeSerde {
        &self.time
    }
}

/// Marks the tag-set id, its name ids and every value id of a key
#[derive(Debug, Clone)]
pub struct TagsRecorder {
    uid: UidLookupDb,
}

impl UsedLookupsRecorder for TagsRecorder {
    fn record_used(&self, txn: &dyn ReadTxn, key: &[u8], used: &mut UsedLookups) -> Result<()> {
        let mut reader = ByteReader::new(key);
        let tag_set_id = self.uid.read_id(&mut reader)?;
        used.mark_uid(tag_set_id);
        let mut names = ByteReader::new(self.uid.require_value(txn, tag_set_id)?);
        while names.remaining() > 0 {
            used.mark_uid(self.uid.read_id(&mut names)?);
            used.mark_uid(self.uid.read_id(&mut reader)?);
        }
        Ok(())
    }

    fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &UsedLookups) -> Result<u64> {
        self.uid.delete_unused(txn, used.uids())
    }
}
