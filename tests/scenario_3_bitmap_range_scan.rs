mod common;

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sbits::{RangeQuery, StorageEngine};

#[test]
fn bitmap_scan_returns_all_and_only_matching_records_and_prunes_pages() {
    let dir = tempfile::tempdir().unwrap();
    // 64-bit bitmap bucketized over [0, 1000).
    let config = common::bitmap_config(dir.path(), 4000, 200, 0, 999, 64, true);
    let mut engine = StorageEngine::open(config).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut expected_in_range: BTreeSet<u32> = BTreeSet::new();
    const N: u32 = 20_000;

    for key in 0..N {
        let data: u32 = rng.gen_range(0..1000);
        engine
            .put(&common::pack_key(key), &common::pack_data(data))
            .unwrap();
        if (300..=630).contains(&data) {
            expected_in_range.insert(key);
        }
    }
    engine.flush().unwrap();

    let total_data_pages_written = engine.stats().data_page_writes;

    engine.reset_stats();
    let query = RangeQuery::new().with_data_range(
        Some(common::pack_data(300)),
        Some(common::pack_data(630)),
    );

    let mut seen: BTreeSet<u32> = BTreeSet::new();
    for item in engine.scan(query) {
        let (key, data) = item.unwrap();
        let key = u32::from_le_bytes(key[..4].try_into().unwrap());
        let data = u32::from_le_bytes(data[..4].try_into().unwrap());
        assert!((300..=630).contains(&data), "out-of-range data {data} for key {key}");
        seen.insert(key);
    }

    assert_eq!(seen, expected_in_range);
    assert!(
        engine.stats().data_page_reads < total_data_pages_written,
        "bitmap-assisted scan should read fewer data pages ({}) than a full scan would ({})",
        engine.stats().data_page_reads,
        total_data_pages_written,
    );
}
