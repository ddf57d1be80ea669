use std::fmt::Debug;

use crate::comparator::read_u32_le;

/// Caller-supplied mapping from a data value to bits in a page-level
/// summary bitmap, plus the overlap test used to prune pages during a scan.
/// `update` must be monotone: the bits set for a value `v` are a subset of
/// the bits set after calling `update` on both `v` and some other `v'`.
pub trait BitmapEncoder: Debug + Send + Sync {
    fn bitmap_size(&self) -> usize;
    fn update(&self, data: &[u8], bitmap: &mut [u8]);
    fn in_bitmap(&self, data: &[u8], bitmap: &[u8]) -> bool;
}

fn set_bit(bitmap: &mut [u8], bit: usize) {
    bitmap[bit / 8] |= 1u8 << (bit % 8);
}

fn bit_is_set(bitmap: &[u8], bit: usize) -> bool {
    bitmap[bit / 8] & (1u8 << (bit % 8)) != 0
}

/// Bucketizes a bounded `u32` data range into `bits` equal-width buckets
/// (8, 16, or 64), reading the data payload's first 4 bytes as a
/// little-endian integer. The same bucketization formula is used at every
/// bit width, so every bucket decodes the same 4-byte value it was
/// constructed to bucket.
#[derive(Debug, Clone, Copy)]
pub struct BucketBitmap {
    min: u32,
    max: u32,
    bits: u32,
}

impl BucketBitmap {
    pub fn new(min: u32, max: u32, bits: u32) -> Self {
        assert!(matches!(bits, 8 | 16 | 64), "bits must be 8, 16, or 64");
        assert!(max > min, "max must be greater than min");
        Self { min, max, bits }
    }

    fn bucket_of(&self, value: u32) -> usize {
        let clamped = value.clamp(self.min, self.max);
        let span = (self.max - self.min) as u64;
        let offset = (clamped - self.min) as u64;
        let bucket = (offset * self.bits as u64) / (span + 1);
        bucket.min(self.bits as u64 - 1) as usize
    }
}

impl BitmapEncoder for BucketBitmap {
    fn bitmap_size(&self) -> usize {
        (self.bits / 8) as usize
    }

    fn update(&self, data: &[u8], bitmap: &mut [u8]) {
        let value = read_u32_le(data);
        set_bit(bitmap, self.bucket_of(value));
    }

    fn in_bitmap(&self, data: &[u8], bitmap: &[u8]) -> bool {
        let value = read_u32_le(data);
        bit_is_set(bitmap, self.bucket_of(value))
    }
}

/// Builds the query bitmap for a `[min_data, max_data]` scan predicate: the
/// bits set for the minimum endpoint through the bits set for the maximum
/// endpoint, inclusive. Either endpoint absent means "unbounded on that
/// side", which degenerates to an all-ones bitmap.
pub fn range_query_bitmap(
    encoder: &dyn BitmapEncoder,
    min_data: Option<&[u8]>,
    max_data: Option<&[u8]>,
) -> Vec<u8> {
    let size = encoder.bitmap_size();
    if min_data.is_none() && max_data.is_none() {
        return vec![0xFFu8; size];
    }

    let first_bit = match min_data {
        Some(d) => {
            let mut bm = vec![0u8; size];
            encoder.update(d, &mut bm);
            first_set_bit(&bm).unwrap_or(0)
        }
        None => 0,
    };

    let last_bit = match max_data {
        Some(d) => {
            let mut bm = vec![0u8; size];
            encoder.update(d, &mut bm);
            last_set_bit(&bm).unwrap_or(size * 8 - 1)
        }
        None => size * 8 - 1,
    };

    let mut out = vec![0u8; size];
    if first_bit <= last_bit {
        for bit in first_bit..=last_bit {
            set_bit(&mut out, bit);
        }
    }
    out
}

/// Page-level pruning predicate: does the query bitmap overlap the page's
/// per-page bitmap summary at all?
pub fn overlaps(query_bitmap: &[u8], page_bitmap: &[u8]) -> bool {
    query_bitmap
        .iter()
        .zip(page_bitmap.iter())
        .any(|(q, p)| q & p != 0)
}

fn first_set_bit(bitmap: &[u8]) -> Option<usize> {
    (0..bitmap.len() * 8).find(|&bit| bit_is_set(bitmap, bit))
}

fn last_set_bit(bitmap: &[u8]) -> Option<usize> {
    (0..bitmap.len() * 8).rev().find(|&bit| bit_is_set(bitmap, bit))
}
