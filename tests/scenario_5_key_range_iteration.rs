mod common;

use sbits::{RangeQuery, StorageEngine};

#[test]
fn key_range_scan_returns_exactly_the_bracketed_keys_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::plain_config(dir.path(), 2000);
    let mut engine = StorageEngine::open(config).unwrap();

    for key in 0..10_000u32 {
        engine
            .put(&common::pack_key(key), &common::pack_data(key % 100))
            .unwrap();
    }
    engine.flush().unwrap();

    let query = RangeQuery::new()
        .with_key_range(Some(common::pack_key(500)), Some(common::pack_key(1500)));

    let mut expected = 500u32;
    let mut count = 0usize;
    for item in engine.scan(query) {
        let (key, _data) = item.unwrap();
        let key = u32::from_le_bytes(key[..4].try_into().unwrap());
        assert_eq!(key, expected);
        expected += 1;
        count += 1;
    }

    assert_eq!(count, 1001);
    assert_eq!(expected, 1501);
}
