//! Hash functions used to key hash lookup entries
//!
//! The hash length is part of the key schema: a store created with 4-byte
//! hashes writes 4-byte ids forever, so the factory is chosen once from
//! settings and shared by every table of the store.

use std::fmt;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use planb_core::HashLength;

/// Produces fixed-width hashes of byte strings
#[allow(clippy::len_without_is_empty)]
pub trait HashFactory: Send + Sync + fmt::Debug {
    /// Hash `bytes`; only the low `len()` bytes are significant
    fn hash(&self, bytes: &[u8]) -> u64;

    /// Number of hash bytes written into ids
    fn len(&self) -> usize;
}

/// xxh3-64, written as 8 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct LongHashFactory;

impl HashFactory for LongHashFactory {
    fn hash(&self, bytes: &[u8]) -> u64 {
        xxh3_64(bytes)
    }

    fn len(&self) -> usize {
        8
    }
}

/// xxh3-64 folded to 32 bits, written as 4 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerHashFactory;

impl HashFactory for IntegerHashFactory {
    fn hash(&self, bytes: &[u8]) -> u64 {
        let h = xxh3_64(bytes);
        u64::from((h ^ (h >> 32)) as u32)
    }

    fn len(&self) -> usize {
        4
    }
}

/// Factory for the configured hash length
pub fn create_hash_factory(length: HashLength) -> Arc<dyn HashFactory> {
    match length {
        HashLength::Integer => Arc::new(IntegerHashFactory),
        HashLength::Long => Arc::new(LongHashFactory),
    }
}
