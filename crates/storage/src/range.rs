//! Byte key ranges for scans and range deletes

use std::ops::Bound;

/// A range of byte keys plus a scan direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower bound
    pub start: Bound<Vec<u8>>,
    /// Upper bound
    pub end: Bound<Vec<u8>>,
    /// Yield entries from the upper bound downwards
    pub reverse: bool,
}

impl KeyRange {
    /// Every key
    pub fn all() -> Self {
        KeyRange {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
            reverse: false,
        }
    }

    /// Every key starting with `prefix`
    pub fn prefix(prefix: &[u8]) -> Self {
        KeyRange {
            start: Bound::Included(prefix.to_vec()),
            end: match prefix_successor(prefix) {
                Some(next) => Bound::Excluded(next),
                None => Bound::Unbounded,
            },
            reverse: false,
        }
    }

    /// Keys in `[start, end]`
    pub fn inclusive(start: &[u8], end: &[u8]) -> Self {
        KeyRange {
            start: Bound::Included(start.to_vec()),
            end: Bound::Included(end.to_vec()),
            reverse: false,
        }
    }

    /// Flip the scan direction to descending
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Borrowed bounds suitable for `BTreeMap::range`
    pub fn as_slices(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (as_slice_bound(&self.start), as_slice_bound(&self.end))
    }

    /// True when no key can satisfy both bounds
    ///
    /// `BTreeMap::range` panics on such ranges so callers check first.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Smallest key greater than every key starting with `prefix`
///
/// Returns `None` if `prefix` is empty or all 0xFF bytes.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < 0xFF {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn test_prefix_range_all_ff() {
        let range = KeyRange::prefix(&[0xFF]);
        assert_eq!(range.end, Bound::Unbounded);
    }

    #[test]
    fn test_is_empty() {
        assert!(KeyRange::inclusive(b"b", b"a").is_empty());
        assert!(!KeyRange::inclusive(b"a", b"a").is_empty());
        assert!(!KeyRange::all().is_empty());
        let r = KeyRange {
            start: Bound::Excluded(b"a".to_vec()),
            end: Bound::Excluded(b"a".to_vec()),
            reverse: false,
        };
        assert!(r.is_empty());
    }
}
