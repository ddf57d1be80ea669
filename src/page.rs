//! Byte-layout codec for data pages and index pages.
//!
//! Both page kinds are views over a fixed-size in-memory frame; nothing here
//! touches the filesystem. `DataPageLayout`/`index_header_size` compute the
//! offsets once per [`crate::config::StorageConfig`] and are cheap to copy
//! around.

use crate::config::StorageConfig;

/// `[logicalPageId(4) | recordCount(2) | bitmap(bitmapSize) | minKey | maxKey
/// | minData | maxData]`.
#[derive(Debug, Clone, Copy)]
pub struct DataPageLayout {
    pub key_size: usize,
    pub data_size: usize,
    pub bitmap_size: usize,
    pub use_min_max: bool,
    pub record_size: usize,
    pub header_size: usize,
    pub max_records: usize,
    bitmap_off: usize,
    min_key_off: usize,
    max_key_off: usize,
    min_data_off: usize,
    max_data_off: usize,
}

impl DataPageLayout {
    pub fn new(config: &StorageConfig) -> Self {
        let bitmap_off = 6;
        let use_min_max = config.use_min_max();
        let min_key_off = bitmap_off + config.bitmap_size;
        let max_key_off = min_key_off + if use_min_max { config.key_size } else { 0 };
        let min_data_off = max_key_off + if use_min_max { config.key_size } else { 0 };
        let max_data_off = min_data_off + if use_min_max { config.data_size } else { 0 };
        let header_size = max_data_off + if use_min_max { config.data_size } else { 0 };
        let record_size = config.record_size();
        let max_records = (config.page_size - header_size) / record_size;
        Self {
            key_size: config.key_size,
            data_size: config.data_size,
            bitmap_size: config.bitmap_size,
            use_min_max,
            record_size,
            header_size,
            max_records,
            bitmap_off,
            min_key_off,
            max_key_off,
            min_data_off,
            max_data_off,
        }
    }

    /// Reads directly out of a raw frame without wrapping it in
    /// [`DataPage`] — used by the read path and the iterator, which need
    /// to interleave page reads with other engine calls that would
    /// conflict with holding a `DataPage<'_>` borrow open.
    pub fn logical_page_id_of(&self, buf: &[u8]) -> u32 {
        u32::from_le_bytes(buf[0..4].try_into().unwrap())
    }

    pub fn count_of(&self, buf: &[u8]) -> u16 {
        u16::from_le_bytes(buf[4..6].try_into().unwrap())
    }

    pub fn bitmap_of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.bitmap_off..self.min_key_off]
    }

    pub fn min_key_of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.min_key_off..self.min_key_off + self.key_size]
    }

    pub fn max_key_of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.max_key_off..self.max_key_off + self.key_size]
    }

    pub fn min_data_of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.min_data_off..self.min_data_off + self.data_size]
    }

    pub fn max_data_of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.max_data_off..self.max_data_off + self.data_size]
    }

    pub fn record_at_of<'b>(&self, buf: &'b [u8], i: usize) -> (&'b [u8], &'b [u8]) {
        debug_assert!(i < self.count_of(buf) as usize);
        let start = self.header_size + i * self.record_size;
        let key = &buf[start..start + self.key_size];
        let data = &buf[start + self.key_size..start + self.key_size + self.data_size];
        (key, data)
    }
}

/// Header size for a data page under `config`, used by
/// [`crate::config::StorageConfig::validate`] before a [`DataPageLayout`]
/// is otherwise needed.
pub fn data_header_size(config: &StorageConfig) -> usize {
    6 + config.bitmap_size
        + if config.use_min_max() {
            2 * config.key_size + 2 * config.data_size
        } else {
            0
        }
}

/// View over a single data page frame. The frame is exactly `layout`-sized
/// and owned by the caller (typically a [`crate::buffer::PageBufferPool`]
/// frame).
pub struct DataPage<'a> {
    buf: &'a mut [u8],
    layout: DataPageLayout,
}

impl<'a> DataPage<'a> {
    /// Zero-fills `buf` and wraps it. Min/max fields stay zeroed until the
    /// first record is inserted; `count() == 0` is the signal that no real
    /// min/max has been established yet, not a byte pattern.
    pub fn init(buf: &'a mut [u8], layout: DataPageLayout) -> Self {
        buf.fill(0);
        Self { buf, layout }
    }

    /// Wraps an already-populated frame (e.g. freshly read from storage).
    pub fn from_existing(buf: &'a mut [u8], layout: DataPageLayout) -> Self {
        Self { buf, layout }
    }

    pub fn layout(&self) -> DataPageLayout {
        self.layout
    }

    pub fn logical_page_id(&self) -> u32 {
        u32::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }

    pub fn set_logical_page_id(&mut self, id: u32) {
        self.buf[0..4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn count(&self) -> u16 {
        u16::from_le_bytes(self.buf[4..6].try_into().unwrap())
    }

    fn set_count(&mut self, count: u16) {
        self.buf[4..6].copy_from_slice(&count.to_le_bytes());
    }

    pub fn inc_count(&mut self) {
        let c = self.count();
        self.set_count(c + 1);
    }

    pub fn bitmap(&self) -> &[u8] {
        &self.buf[self.layout.bitmap_off..self.layout.min_key_off]
    }

    pub fn bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.layout.bitmap_off..self.layout.min_key_off]
    }

    pub fn min_key(&self) -> &[u8] {
        &self.buf[self.layout.min_key_off..self.layout.min_key_off + self.layout.key_size]
    }

    pub fn max_key(&self) -> &[u8] {
        &self.buf[self.layout.max_key_off..self.layout.max_key_off + self.layout.key_size]
    }

    pub fn min_data(&self) -> &[u8] {
        &self.buf[self.layout.min_data_off..self.layout.min_data_off + self.layout.data_size]
    }

    pub fn max_data(&self) -> &[u8] {
        &self.buf[self.layout.max_data_off..self.layout.max_data_off + self.layout.data_size]
    }

    pub fn set_min_key(&mut self, key: &[u8]) {
        let off = self.layout.min_key_off;
        self.buf[off..off + self.layout.key_size].copy_from_slice(key);
    }

    pub fn set_max_key(&mut self, key: &[u8]) {
        let off = self.layout.max_key_off;
        self.buf[off..off + self.layout.key_size].copy_from_slice(key);
    }

    pub fn set_min_data(&mut self, data: &[u8]) {
        let off = self.layout.min_data_off;
        self.buf[off..off + self.layout.data_size].copy_from_slice(data);
    }

    pub fn set_max_data(&mut self, data: &[u8]) {
        let off = self.layout.max_data_off;
        self.buf[off..off + self.layout.data_size].copy_from_slice(data);
    }

    pub fn record_at(&self, i: usize) -> (&[u8], &[u8]) {
        debug_assert!(i < self.count() as usize);
        let start = self.layout.header_size + i * self.layout.record_size;
        let key = &self.buf[start..start + self.layout.key_size];
        let data = &self.buf
            [start + self.layout.key_size..start + self.layout.key_size + self.layout.data_size];
        (key, data)
    }

    /// Appends one record at the current count and increments it. Callers
    /// are responsible for updating min/max/bitmap summaries beforehand —
    /// the engine's write path sequences these explicitly.
    pub fn push_record(&mut self, key: &[u8], data: &[u8]) {
        let i = self.count() as usize;
        debug_assert!(i < self.layout.max_records);
        let start = self.layout.header_size + i * self.layout.record_size;
        self.buf[start..start + self.layout.key_size].copy_from_slice(key);
        self.buf[start + self.layout.key_size..start + self.layout.record_size]
            .copy_from_slice(data);
        self.inc_count();
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buf
    }
}

/// Fixed 16-byte index page header:
/// `[logicalIdxId(4) | count(2) | pad(2) | minDataPageIdCovered(4) | reserved(4)]`.
pub const INDEX_HEADER_SIZE: usize = 16;

pub fn max_index_records_per_page(config: &StorageConfig) -> usize {
    (config.page_size - INDEX_HEADER_SIZE) / config.bitmap_size
}

pub fn index_logical_idx_id_of(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[0..4].try_into().unwrap())
}

pub fn index_count_of(buf: &[u8]) -> u16 {
    u16::from_le_bytes(buf[4..6].try_into().unwrap())
}

pub fn index_min_data_page_id_covered_of(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[8..12].try_into().unwrap())
}

pub fn index_entry_of(buf: &[u8], bitmap_size: usize, i: usize) -> &[u8] {
    let start = INDEX_HEADER_SIZE + i * bitmap_size;
    &buf[start..start + bitmap_size]
}

pub struct IndexPage<'a> {
    buf: &'a mut [u8],
    bitmap_size: usize,
}

impl<'a> IndexPage<'a> {
    pub fn init(buf: &'a mut [u8], bitmap_size: usize) -> Self {
        buf.fill(0);
        Self { buf, bitmap_size }
    }

    pub fn from_existing(buf: &'a mut [u8], bitmap_size: usize) -> Self {
        Self { buf, bitmap_size }
    }

    pub fn logical_idx_id(&self) -> u32 {
        u32::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }

    pub fn set_logical_idx_id(&mut self, id: u32) {
        self.buf[0..4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn count(&self) -> u16 {
        u16::from_le_bytes(self.buf[4..6].try_into().unwrap())
    }

    fn set_count(&mut self, count: u16) {
        self.buf[4..6].copy_from_slice(&count.to_le_bytes());
    }

    pub fn inc_count(&mut self) {
        let c = self.count();
        self.set_count(c + 1);
    }

    pub fn min_data_page_id_covered(&self) -> u32 {
        u32::from_le_bytes(self.buf[8..12].try_into().unwrap())
    }

    pub fn set_min_data_page_id_covered(&mut self, id: u32) {
        self.buf[8..12].copy_from_slice(&id.to_le_bytes());
    }

    pub fn entry(&self, i: usize) -> &[u8] {
        debug_assert!(i < self.count() as usize);
        let start = INDEX_HEADER_SIZE + i * self.bitmap_size;
        &self.buf[start..start + self.bitmap_size]
    }

    pub fn push_entry(&mut self, bitmap: &[u8]) {
        debug_assert_eq!(bitmap.len(), self.bitmap_size);
        let i = self.count() as usize;
        let start = INDEX_HEADER_SIZE + i * self.bitmap_size;
        self.buf[start..start + self.bitmap_size].copy_from_slice(bitmap);
        self.inc_count();
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{U32DataComparator, U32KeyComparator};
    use crate::config::{Parameters, SearchStrategy, StorageConfig};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn layout() -> DataPageLayout {
        let cfg = StorageConfig {
            key_size: 4,
            data_size: 4,
            page_size: 64,
            buffer_size_in_blocks: 2,
            data_start_address: 0,
            data_end_address: 0,
            index_start_address: 0,
            index_end_address: 0,
            erase_size_in_pages: 4,
            parameters: Parameters::MAX_MIN,
            bitmap_size: 0,
            key_comparator: Arc::new(U32KeyComparator),
            data_comparator: Arc::new(U32DataComparator),
            bitmap_encoder: None,
            search_strategy: SearchStrategy::Interpolated,
            data_dir: PathBuf::from("."),
        };
        DataPageLayout::new(&cfg)
    }

    #[test]
    fn header_size_matches_formula() {
        let l = layout();
        // 6 + 0 (no bitmap) + 2*4 (key) + 2*4 (data) = 22
        assert_eq!(l.header_size, 22);
        assert_eq!(l.record_size, 8);
        assert_eq!(l.max_records, (64 - 22) / 8);
    }

    #[test]
    fn round_trips_records_and_summaries() {
        let l = layout();
        let mut frame = vec![0u8; 64];
        let mut page = DataPage::init(&mut frame, l);
        page.set_logical_page_id(7);
        page.set_min_key(&1u32.to_le_bytes());
        page.set_max_key(&1u32.to_le_bytes());
        page.set_min_data(&100u32.to_le_bytes());
        page.set_max_data(&100u32.to_le_bytes());
        page.push_record(&1u32.to_le_bytes(), &100u32.to_le_bytes());
        page.set_max_key(&2u32.to_le_bytes());
        page.push_record(&2u32.to_le_bytes(), &50u32.to_le_bytes());

        assert_eq!(page.logical_page_id(), 7);
        assert_eq!(page.count(), 2);
        let (k, d) = page.record_at(1);
        assert_eq!(u32::from_le_bytes(k.try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(d.try_into().unwrap()), 50);
        assert_eq!(u32::from_le_bytes(page.max_key().try_into().unwrap()), 2);
    }

    #[test]
    fn index_page_round_trips_entries() {
        let mut frame = vec![0u8; 64];
        let mut idx = IndexPage::init(&mut frame, 8);
        idx.set_logical_idx_id(3);
        idx.set_min_data_page_id_covered(40);
        idx.push_entry(&[0xFFu8; 8]);
        idx.push_entry(&[0x0Fu8; 8]);

        assert_eq!(idx.logical_idx_id(), 3);
        assert_eq!(idx.min_data_page_id_covered(), 40);
        assert_eq!(idx.count(), 2);
        assert_eq!(idx.entry(1), &[0x0Fu8; 8]);
    }
}
