//! Value store key format
//!
//! ```text
//! ┌──────────────────┬──────────────────────┐
//! │ Hash (8 bytes)   │ Unique id (2 bytes)  │
//! └──────────────────┴──────────────────────┘
//! ```

use planb_core::{Error, Result};

use crate::bytes::ByteReader;

/// Identifies one deduplicated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueStoreKey {
    /// Hash of the value bytes
    pub hash: u64,
    /// Disambiguator among values sharing `hash`
    pub unique_id: u16,
}

impl ValueStoreKey {
    /// Encoded length
    pub const LEN: usize = 10;

    /// Create a key
    pub fn new(hash: u64, unique_id: u16) -> Self {
        ValueStoreKey { hash, unique_id }
    }

    /// Encode to the fixed layout
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..8].copy_from_slice(&self.hash.to_be_bytes());
        out[8..].copy_from_slice(&self.unique_id.to_be_bytes());
        out
    }

    /// Decode from exactly [`Self::LEN`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(Error::corruption(format!(
                "value store key must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut reader = ByteReader::new(bytes);
        Ok(ValueStoreKey {
            hash: reader.u64()?,
            unique_id: reader.u16()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let key = ValueStoreKey::new(0x0102_0304_0506_0708, 0x090A);
        assert_eq!(key.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(ValueStoreKey::from_bytes(&key.to_bytes()).unwrap(), key);
    }

    #[test]
    fn test_wrong_length() {
        assert!(ValueStoreKey::from_bytes(&[0; 9]).is_err());
        assert!(ValueStoreKey::from_bytes(&[0; 11]).is_err());
    }
}
