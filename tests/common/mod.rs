use std::path::Path;
use std::sync::Arc;

use sbits::{
    BucketBitmap, Parameters, SearchStrategy, StorageConfig, U32DataComparator, U32KeyComparator,
};

pub const KEY_SIZE: usize = 4;
pub const DATA_SIZE: usize = 12;
pub const PAGE_SIZE: usize = 512;

/// Routes `log` output through the test harness; safe to call from every
/// test, only the first call in a process takes effect.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Packs a `u32` into a `DATA_SIZE`-byte record payload (LE in the first 4
/// bytes, zero-padded).
pub fn pack_data(value: u32) -> Vec<u8> {
    let mut buf = vec![0u8; DATA_SIZE];
    buf[..4].copy_from_slice(&value.to_le_bytes());
    buf
}

pub fn pack_key(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Plain config: min/max summaries only, no bitmap, no secondary index.
pub fn plain_config(dir: &Path, data_region_pages: u64) -> StorageConfig {
    StorageConfig {
        key_size: KEY_SIZE,
        data_size: DATA_SIZE,
        page_size: PAGE_SIZE,
        buffer_size_in_blocks: 4,
        data_start_address: 0,
        data_end_address: PAGE_SIZE as u64 * data_region_pages,
        index_start_address: 0,
        index_end_address: 0,
        erase_size_in_pages: 4,
        parameters: Parameters::MAX_MIN,
        bitmap_size: 0,
        key_comparator: Arc::new(U32KeyComparator),
        data_comparator: Arc::new(U32DataComparator),
        bitmap_encoder: None,
        search_strategy: SearchStrategy::Interpolated,
        data_dir: dir.to_path_buf(),
    }
}

/// Config with a bucketized bitmap over `[bitmap_min, bitmap_max]` and,
/// when `with_index` is set, a secondary bitmap index.
pub fn bitmap_config(
    dir: &Path,
    data_region_pages: u64,
    index_region_pages: u64,
    bitmap_min: u32,
    bitmap_max: u32,
    bitmap_bits: u32,
    with_index: bool,
) -> StorageConfig {
    let mut parameters = Parameters::MAX_MIN | Parameters::BMAP;
    if with_index {
        parameters = parameters | Parameters::INDEX;
    }
    StorageConfig {
        key_size: KEY_SIZE,
        data_size: DATA_SIZE,
        page_size: PAGE_SIZE,
        buffer_size_in_blocks: 4,
        data_start_address: 0,
        data_end_address: PAGE_SIZE as u64 * data_region_pages,
        index_start_address: 0,
        index_end_address: PAGE_SIZE as u64 * index_region_pages,
        erase_size_in_pages: 4,
        parameters,
        bitmap_size: (bitmap_bits / 8) as usize,
        key_comparator: Arc::new(U32KeyComparator),
        data_comparator: Arc::new(U32DataComparator),
        bitmap_encoder: Some(Arc::new(BucketBitmap::new(bitmap_min, bitmap_max, bitmap_bits))),
        search_strategy: SearchStrategy::Interpolated,
        data_dir: dir.to_path_buf(),
    }
}
