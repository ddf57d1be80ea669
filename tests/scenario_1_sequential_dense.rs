mod common;

use sbits::StorageEngine;

#[test]
fn get_returns_every_inserted_key_modulo_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::plain_config(dir.path(), 2000);
    let mut engine = StorageEngine::open(config).unwrap();

    for key in 0..10_000u32 {
        engine
            .put(&common::pack_key(key), &common::pack_data(key % 100))
            .unwrap();
    }
    engine.flush().unwrap();

    let mut out = vec![0u8; common::DATA_SIZE];
    for key in 0..10_000u32 {
        let found = engine.get(&common::pack_key(key), &mut out).unwrap();
        assert!(found, "key {key} should be found");
        let data = u32::from_le_bytes(out[..4].try_into().unwrap());
        assert_eq!(data, key % 100, "wrong data for key {key}");
    }
}
