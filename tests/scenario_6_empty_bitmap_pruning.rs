mod common;

use sbits::{RangeQuery, StorageEngine};

#[test]
fn disjoint_data_range_reads_zero_data_pages() {
    let dir = tempfile::tempdir().unwrap();
    // All data values stay in [0, 500); the bitmap covers [0, 999) so a
    // query over [800, 900] can never overlap a single page's bitmap.
    let config = common::bitmap_config(dir.path(), 2000, 100, 0, 999, 64, true);
    let mut engine = StorageEngine::open(config).unwrap();

    for key in 0..5_000u32 {
        engine
            .put(&common::pack_key(key), &common::pack_data(key % 500))
            .unwrap();
    }
    engine.flush().unwrap();

    engine.reset_stats();
    let query = RangeQuery::new().with_data_range(
        Some(common::pack_data(800)),
        Some(common::pack_data(900)),
    );

    let mut count = 0usize;
    for item in engine.scan(query) {
        item.unwrap();
        count += 1;
    }

    assert_eq!(count, 0);
    assert_eq!(engine.stats().data_page_reads, 0);
    assert!(engine.stats().index_page_reads > 0);
}
