//! Value store metadata record
//!
//! ```text
//! ┌──────────────────┬───────────────────────────┐
//! │ Type id (1 byte) │ Reference count (4 bytes) │
//! └──────────────────┴───────────────────────────┘
//! ```
//!
//! The reference count sits at a fixed offset so it can be adjusted without
//! decoding the record. Adjustments return a fresh buffer; the input slice,
//! which usually borrows from a transaction, is never written to.

use planb_core::{Error, Result};

/// Offset of the type id
pub const TYPE_ID_OFFSET: usize = 0;
/// Offset of the big-endian u32 reference count
pub const REF_COUNT_OFFSET: usize = 1;
/// Encoded length
pub const META_LEN: usize = REF_COUNT_OFFSET + 4;

/// Type id and reference count of one stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueStoreMeta {
    /// Type id of the stored value
    pub type_id: u8,
    /// Number of live references
    pub ref_count: u32,
}

impl ValueStoreMeta {
    /// Create a record
    pub fn new(type_id: u8, ref_count: u32) -> Self {
        ValueStoreMeta { type_id, ref_count }
    }

    /// Encode to the fixed layout
    pub fn encode(&self) -> [u8; META_LEN] {
        let mut out = [0u8; META_LEN];
        out[TYPE_ID_OFFSET] = self.type_id;
        out[REF_COUNT_OFFSET..].copy_from_slice(&self.ref_count.to_be_bytes());
        out
    }

    /// Decode a record
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes)?;
        Ok(ValueStoreMeta {
            type_id: read_type_id(bytes)?,
            ref_count: read_ref_count(bytes)?,
        })
    }
}

fn check_len(bytes: &[u8]) -> Result<()> {
    if bytes.len() == META_LEN {
        Ok(())
    } else {
        Err(Error::corruption(format!(
            "value store meta must be {META_LEN} bytes, got {}",
            bytes.len()
        )))
    }
}

/// Type id of an encoded record
pub fn read_type_id(bytes: &[u8]) -> Result<u8> {
    check_len(bytes)?;
    Ok(bytes[TYPE_ID_OFFSET])
}

/// Reference count of an encoded record
pub fn read_ref_count(bytes: &[u8]) -> Result<u32> {
    check_len(bytes)?;
    let mut count = [0u8; 4];
    count.copy_from_slice(&bytes[REF_COUNT_OFFSET..META_LEN]);
    Ok(u32::from_be_bytes(count))
}

fn with_ref_count(bytes: &[u8], ref_count: u32) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out[REF_COUNT_OFFSET..META_LEN].copy_from_slice(&ref_count.to_be_bytes());
    out
}

/// Copy of `bytes` with the reference count raised by one
pub fn clone_and_increment_ref_count(bytes: &[u8]) -> Result<Vec<u8>> {
    let count = read_ref_count(bytes)?;
    let count = count.checked_add(1).ok_or(Error::RefCountOverflow)?;
    Ok(with_ref_count(bytes, count))
}

/// Copy of `bytes` with the reference count lowered by one
pub fn clone_and_decrement_ref_count(bytes: &[u8]) -> Result<Vec<u8>> {
    let count = read_ref_count(bytes)?;
    let count = count.checked_sub(1).ok_or(Error::RefCountUnderflow)?;
    Ok(with_ref_count(bytes, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_layout() {
        let meta = ValueStoreMeta::new(9, 0x0102_0304);
        assert_eq!(meta.encode(), [9, 1, 2, 3, 4]);
        assert_eq!(ValueStoreMeta::decode(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn test_zero_boundary() {
        let one = ValueStoreMeta::new(1, 1).encode();
        let zero = clone_and_decrement_ref_count(&one).unwrap();
        assert_eq!(read_ref_count(&zero).unwrap(), 0);
        assert!(matches!(
            clone_and_decrement_ref_count(&zero),
            Err(Error::RefCountUnderflow)
        ));
        assert_eq!(
            read_ref_count(&clone_and_increment_ref_count(&zero).unwrap()).unwrap(),
            1
        );
    }

    #[test]
    fn test_overflow() {
        let max = ValueStoreMeta::new(1, u32::MAX).encode();
        assert!(matches!(
            clone_and_increment_ref_count(&max),
            Err(Error::RefCountOverflow)
        ));
    }

    #[test]
    fn test_input_untouched() {
        let original = ValueStoreMeta::new(4, 7).encode();
        let copy = original;
        let _ = clone_and_increment_ref_count(&original).unwrap();
        assert_eq!(original, copy);
    }

    #[test]
    fn test_truncated() {
        assert!(read_ref_count(&[1, 0, 0]).is_err());
        assert!(ValueStoreMeta::decode(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_increment_then_decrement(type_id in any::<u8>(), count in 0u32..u32::MAX) {
            let meta = ValueStoreMeta::new(type_id, count);
            let up = clone_and_increment_ref_count(&meta.encode()).unwrap();
            let decoded = ValueStoreMeta::decode(&up).unwrap();
            prop_assert_eq!(decoded.ref_count, count + 1);
            prop_assert_eq!(decoded.type_id, type_id);

            let down = clone_and_decrement_ref_count(&up).unwrap();
            prop_assert_eq!(ValueStoreMeta::decode(&down).unwrap(), meta);
        }
    }
}
