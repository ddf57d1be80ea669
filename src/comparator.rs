use std::cmp::Ordering;
use std::fmt::Debug;

/// Caller-supplied key ordering over raw key bytes. Modeled as a trait
/// object rather than a generic parameter so that `key_size` stays a
/// runtime-configurable value.
pub trait KeyComparator: Debug + Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Projects a key onto `u64` for the interpolated search's arithmetic,
    /// which needs a numeric distance between keys, not just an ordering.
    /// Reference comparators below decode their own little-endian key
    /// bytes; a caller supplying a non-numeric key type can fall back to
    /// `SearchStrategy::BinaryOnly`, which never calls this method.
    fn to_u64(&self, key: &[u8]) -> u64;
}

/// Caller-supplied data ordering, used to maintain per-page min/max data
/// summaries. Need not be a total order consistent with the bitmap encoder.
pub trait DataComparator: Debug + Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Reference comparator for 4-byte little-endian unsigned keys (a typical
/// timestamp key).
#[derive(Debug, Clone, Copy, Default)]
pub struct U32KeyComparator;

impl KeyComparator for U32KeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let a = u32::from_le_bytes(a[..4].try_into().unwrap());
        let b = u32::from_le_bytes(b[..4].try_into().unwrap());
        a.cmp(&b)
    }

    fn to_u64(&self, key: &[u8]) -> u64 {
        read_u32_le(key) as u64
    }
}

/// Reference comparator for 8-byte little-endian unsigned keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64KeyComparator;

impl KeyComparator for U64KeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let a = u64::from_le_bytes(a[..8].try_into().unwrap());
        let b = u64::from_le_bytes(b[..8].try_into().unwrap());
        a.cmp(&b)
    }

    fn to_u64(&self, key: &[u8]) -> u64 {
        u64::from_le_bytes(key[..8].try_into().unwrap())
    }
}

/// Reference comparator treating the first 4 bytes of the data payload as a
/// little-endian unsigned integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct U32DataComparator;

impl DataComparator for U32DataComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let a = u32::from_le_bytes(a[..4].try_into().unwrap());
        let b = u32::from_le_bytes(b[..4].try_into().unwrap());
        a.cmp(&b)
    }
}

/// Reads the first 4 bytes of `key`/`data` as a little-endian `u32`. Used by
/// the interpolated search and the reference comparators above to avoid
/// repeating the byte-slicing in several places.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[..4].try_into().unwrap())
}
