//! Surrogate lookup tables
//!
//! Values too large to sit inside a key are replaced by a short surrogate id
//! resolved through one of two tables:
//!
//! - [`UidLookupDb`]: sequential ids with a reverse index for deduplication
//! - [`HashLookupDb`]: `hash ‖ unique_id` ids, collisions disambiguated by
//!   the unique id suffix
//!
//! Both tables distinguish a probe (`get_id`, absent is `Ok(None)`) from a
//! required read (`require_value`, absent is `LookupMissing`).

mod hash;
mod uid;

pub use hash::{HashId, HashLookupDb, DEFAULT_MAX_UNIQUE_ID};
pub use uid::UidLookupDb;

use planb_core::Result;
use planb_storage::{KeyRange, ReadTxn, TableId};

/// Width of the collision disambiguator appended to a hash
pub const UNIQUE_ID_WIDTH: usize = 2;

/// Outcome of scanning one hash bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The value is already stored under this unique id
    Found(u16),
    /// The value is absent; this is the lowest unused unique id
    Free(u16),
    /// The value is absent and every unique id up to the cap is taken
    Full,
}

/// Scan the bucket of keys `bucket ‖ u16` looking for an entry `matches`
/// accepts, remembering the lowest gap in the unique id sequence
pub(crate) fn probe_bucket(
    txn: &dyn ReadTxn,
    table: TableId,
    bucket: &[u8],
    max_unique_id: u16,
    mut matches: impl FnMut(&[u8], &[u8]) -> Result<bool>,
) -> Result<Probe> {
    let mut next: u32 = 0;
    let mut first_free: Option<u16> = None;
    for (key, value) in txn.scan(table, KeyRange::prefix(bucket))? {
        if key.len() != bucket.len() + UNIQUE_ID_WIDTH {
            continue;
        }
        let unique_id = u16::from_be_bytes([key[bucket.len()], key[bucket.len() + 1]]);
        if matches(key, value)? {
            return Ok(Probe::Found(unique_id));
        }
        if first_free.is_none() && u32::from(unique_id) > next {
            first_free = Some(next as u16);
        }
        next = u32::from(unique_id) + 1;
    }
    match first_free {
        Some(free) => Ok(Probe::Free(free)),
        None if next <= u32::from(max_unique_id) => Ok(Probe::Free(next as u16)),
        None => Ok(Probe::Full),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planb_storage::{MemoryEnv, TableRegistry, WriteTxn};

    fn key(bucket: &[u8], unique_id: u16) -> Vec<u8> {
        let mut k = bucket.to_vec();
        k.extend_from_slice(&unique_id.to_be_bytes());
        k
    }

    fn eq(target: &'static [u8]) -> impl FnMut(&[u8], &[u8]) -> Result<bool> {
        move |_: &[u8], v: &[u8]| Ok(v == target)
    }

    #[test]
    fn test_empty_bucket() {
        let env = MemoryEnv::new();
        let t = env.open_table("t");
        let txn = env.begin_read();
        assert_eq!(
            probe_bucket(&txn, t, b"h", 10, eq(b"x")).unwrap(),
            Probe::Free(0)
        );
    }

    #[test]
    fn test_found_after_gap() {
        let env = MemoryEnv::new();
        let t = env.open_table("t");
        env.write(|txn| {
            txn.put(t, &key(b"h", 0), b"a")?;
            txn.put(t, &key(b"h", 2), b"c")?;
            txn.put(t, &key(b"i", 0), b"other bucket")
        })
        .unwrap();
        let txn = env.begin_read();
        assert_eq!(
            probe_bucket(&txn, t, b"h", 10, eq(b"c")).unwrap(),
            Probe::Found(2)
        );
        assert_eq!(
            probe_bucket(&txn, t, b"h", 10, eq(b"z")).unwrap(),
            Probe::Free(1)
        );
    }

    #[test]
    fn test_full_bucket() {
        let env = MemoryEnv::new();
        let t = env.open_table("t");
        env.write(|txn| {
            txn.put(t, &key(b"h", 0), b"a")?;
            txn.put(t, &key(b"h", 1), b"b")
        })
        .unwrap();
        let txn = env.begin_read();
        assert_eq!(
            probe_bucket(&txn, t, b"h", 1, eq(b"z")).unwrap(),
            Probe::Full
        );
        assert_eq!(
            probe_bucket(&txn, t, b"h", 2, eq(b"z")).unwrap(),
            Probe::Free(2)
        );
    }
}
