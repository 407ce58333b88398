//! Hash surrogate table
//!
//! ```text
//! {name}-hash  [hash (hash len bytes)][unique_id u16]  -> [value]
//! ```
//!
//! Values sharing a hash live in one bucket and are told apart by the unique
//! id suffix. Insertion reuses the lowest free suffix in the bucket and fails
//! with `HashCollisionExhausted` once every suffix up to the cap is taken.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use planb_core::{Error, Result};
use planb_storage::{KeyRange, ReadTxn, TableId, TableRegistry, WriteTxn};

use super::{probe_bucket, Probe, UNIQUE_ID_WIDTH};
use crate::bytes::ByteReader;
use crate::hash::HashFactory;

/// Highest unique id handed out by default
pub const DEFAULT_MAX_UNIQUE_ID: u16 = u16::MAX;

/// Surrogate id of a hash-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashId {
    /// Hash of the value, truncated to the table's hash length
    pub hash: u64,
    /// Disambiguator among values sharing `hash`
    pub unique_id: u16,
}

/// Value ↔ hash id table
#[derive(Debug, Clone)]
pub struct HashLookupDb {
    name: String,
    table: TableId,
    hash_factory: Arc<dyn HashFactory>,
    max_unique_id: u16,
}

impl HashLookupDb {
    /// Open the table for `name`
    pub fn new(env: &dyn TableRegistry, name: &str, hash_factory: Arc<dyn HashFactory>) -> Self {
        let name = format!("{name}-hash");
        HashLookupDb {
            table: env.open_table(&name),
            name,
            hash_factory,
            max_unique_id: DEFAULT_MAX_UNIQUE_ID,
        }
    }

    /// Cap the unique id space of every bucket
    pub fn with_max_unique_id(mut self, max_unique_id: u16) -> Self {
        self.max_unique_id = max_unique_id;
        self
    }

    /// Table name used in errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded width of an id
    #[inline]
    pub fn id_width(&self) -> usize {
        self.hash_factory.len() + UNIQUE_ID_WIDTH
    }

    /// Append `id`
    pub fn write_id(&self, buf: &mut Vec<u8>, id: &HashId) {
        self.write_hash(buf, id.hash);
        buf.extend_from_slice(&id.unique_id.to_be_bytes());
    }

    /// Read one id from `reader`
    pub fn read_id(&self, reader: &mut ByteReader<'_>) -> Result<HashId> {
        Ok(HashId {
            hash: reader.uint(self.hash_factory.len())?,
            unique_id: reader.u16()?,
        })
    }

    fn write_hash(&self, buf: &mut Vec<u8>, hash: u64) {
        let len = self.hash_factory.len();
        buf.extend_from_slice(&hash.to_be_bytes()[8 - len..]);
    }

    fn hash_of(&self, value: &[u8]) -> u64 {
        let hash = self.hash_factory.hash(value);
        match self.hash_factory.len() {
            8 => hash,
            len => hash & ((1u64 << (len * 8)) - 1),
        }
    }

    fn probe(&self, txn: &dyn ReadTxn, hash: u64, value: &[u8]) -> Result<Probe> {
        let mut bucket = Vec::with_capacity(self.hash_factory.len());
        self.write_hash(&mut bucket, hash);
        probe_bucket(txn, self.table, &bucket, self.max_unique_id, |_, stored| {
            Ok(stored == value)
        })
    }

    /// Id of `value`, inserting it if it is new
    pub fn put(&self, txn: &mut dyn WriteTxn, value: &[u8]) -> Result<HashId> {
        let hash = self.hash_of(value);
        let unique_id = match self.probe(txn.as_read(), hash, value)? {
            Probe::Found(unique_id) => return Ok(HashId { hash, unique_id }),
            Probe::Free(unique_id) => unique_id,
            Probe::Full => {
                return Err(Error::HashCollisionExhausted {
                    table: self.name.clone(),
                    hash,
                });
            }
        };
        if unique_id > 0 {
            debug!(target: "planb::lookup", table = %self.name, hash, unique_id, "Hash collision");
        }
        let id = HashId { hash, unique_id };
        let mut key = Vec::with_capacity(self.id_width());
        self.write_id(&mut key, &id);
        txn.put(self.table, &key, value)?;
        Ok(id)
    }

    /// Id of `value` if it is stored; never inserts
    pub fn get_id(&self, txn: &dyn ReadTxn, value: &[u8]) -> Result<Option<HashId>> {
        let hash = self.hash_of(value);
        Ok(match self.probe(txn, hash, value)? {
            Probe::Found(unique_id) => Some(HashId { hash, unique_id }),
            Probe::Free(_) | Probe::Full => None,
        })
    }

    /// Value stored under `id`
    pub fn get_value<'t>(&self, txn: &'t dyn ReadTxn, id: &HashId) -> Result<Option<&'t [u8]>> {
        let mut key = Vec::with_capacity(self.id_width());
        self.write_id(&mut key, id);
        txn.get(self.table, &key)
    }

    /// Value stored under `id`, which must exist
    pub fn require_value<'t>(&self, txn: &'t dyn ReadTxn, id: &HashId) -> Result<&'t [u8]> {
        self.get_value(txn, id)?.ok_or_else(|| {
            let mut key = Vec::with_capacity(self.id_width());
            self.write_id(&mut key, id);
            Error::LookupMissing {
                table: self.name.clone(),
                id: key,
            }
        })
    }

    /// Number of stored values
    pub fn entry_count(&self, txn: &dyn ReadTxn) -> Result<u64> {
        txn.entry_count(self.table)
    }

    /// Delete every entry whose id is not in `used`
    pub fn delete_unused(&self, txn: &mut dyn WriteTxn, used: &FxHashSet<HashId>) -> Result<u64> {
        let mut unused = Vec::new();
        for (key, _) in txn.scan(self.table, KeyRange::all())? {
            let mut reader = ByteReader::new(key);
            let id = self.read_id(&mut reader)?;
            reader.finish()?;
            if !used.contains(&id) {
                unused.push(key.to_vec());
            }
        }
        for key in &unused {
            txn.delete(self.table, key)?;
        }
        Ok(unused.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{IntegerHashFactory, LongHashFactory};
    use planb_storage::MemoryEnv;

    #[derive(Debug)]
    struct ConstantHash;

    impl HashFactory for ConstantHash {
        fn hash(&self, _: &[u8]) -> u64 {
            0xABCD
        }

        fn len(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_put_get() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(LongHashFactory));
        let id = env.write(|txn| db.put(txn, b"value")).unwrap();
        assert_eq!(id.unique_id, 0);
        assert_eq!(env.write(|txn| db.put(txn, b"value")).unwrap(), id);

        let txn = env.begin_read();
        assert_eq!(db.get_value(&txn, &id).unwrap(), Some(&b"value"[..]));
        assert_eq!(db.get_id(&txn, b"value").unwrap(), Some(id));
        assert_eq!(db.get_id(&txn, b"other").unwrap(), None);
        assert_eq!(db.entry_count(&txn).unwrap(), 1);
    }

    #[test]
    fn test_integer_ids_are_six_bytes() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(IntegerHashFactory));
        assert_eq!(db.id_width(), 6);
        let id = env.write(|txn| db.put(txn, b"v")).unwrap();
        let mut buf = Vec::new();
        db.write_id(&mut buf, &id);
        assert_eq!(buf.len(), 6);
        assert_eq!(db.read_id(&mut ByteReader::new(&buf)).unwrap(), id);
    }

    #[test]
    fn test_collisions_are_disambiguated() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(ConstantHash));
        let (a, b) = env
            .write(|txn| Ok((db.put(txn, b"first")?, db.put(txn, b"second")?)))
            .unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!((a.unique_id, b.unique_id), (0, 1));

        let txn = env.begin_read();
        assert_eq!(db.require_value(&txn, &a).unwrap(), b"first");
        assert_eq!(db.require_value(&txn, &b).unwrap(), b"second");
    }

    #[test]
    fn test_collision_space_exhausted() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(ConstantHash)).with_max_unique_id(1);
        env.write(|txn| {
            db.put(txn, b"a")?;
            db.put(txn, b"b")
        })
        .unwrap();
        let result = env.write(|txn| db.put(txn, b"c"));
        assert!(matches!(
            result,
            Err(Error::HashCollisionExhausted { hash: 0xABCD, .. })
        ));
        // An existing value still resolves once the bucket is full.
        assert_eq!(env.write(|txn| db.put(txn, b"b")).unwrap().unique_id, 1);
    }

    #[test]
    fn test_swept_slot_is_reused() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(ConstantHash));
        let (a, b) = env
            .write(|txn| Ok((db.put(txn, b"a")?, db.put(txn, b"b")?)))
            .unwrap();

        let used: FxHashSet<HashId> = [b].into_iter().collect();
        assert_eq!(env.write(|txn| db.delete_unused(txn, &used)).unwrap(), 1);

        let c = env.write(|txn| db.put(txn, b"c")).unwrap();
        assert_eq!(c.unique_id, a.unique_id);
        let txn = env.begin_read();
        assert_eq!(db.require_value(&txn, &b).unwrap(), b"b");
        assert_eq!(db.require_value(&txn, &c).unwrap(), b"c");
    }

    #[test]
    fn test_require_missing() {
        let env = MemoryEnv::new();
        let db = HashLookupDb::new(&env, "key", Arc::new(ConstantHash));
        let txn = env.begin_read();
        let id = HashId {
            hash: 1,
            unique_id: 2,
        };
        assert!(matches!(
            db.require_value(&txn, &id),
            Err(Error::LookupMissing { .. })
        ));
    }
}
