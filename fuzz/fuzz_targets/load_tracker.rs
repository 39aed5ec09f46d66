#![no_main]

use std::fs;

use libfuzzer_sys::fuzz_target;
use nadi_tracker::{DeliveryStore, FileStore, parse_snapshot};
use tempfile::tempdir;

fuzz_target!(|data: &[u8]| {
    let _ = parse_snapshot(data);

    let td = match tempdir() {
        Ok(v) => v,
        Err(_) => return,
    };

    let path = td.path().join("tracker.json");
    if fs::write(&path, data).is_ok() {
        let store = FileStore::new(path);
        if let Ok(set) = store.load() {
            // Anything that loads must survive a save/load cycle unchanged.
            if store.save(&set).is_ok() {
                assert_eq!(store.load().ok(), Some(set));
            }
        }
    }
});
