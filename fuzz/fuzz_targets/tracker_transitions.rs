#![no_main]

use libfuzzer_sys::fuzz_target;
use nadi_tracker::DeliverySet;
use nadi_types::DeliveryStatus;

// Each byte is one attempt: low bit picks the file, bit 1 picks the outcome.
fuzz_target!(|data: &[u8]| {
    let Some((&max_tries, ops)) = data.split_first() else {
        return;
    };
    let max_tries = u32::from(max_tries % 8);
    let mut set = DeliverySet::new();

    for op in ops {
        let name = if op & 1 == 0 { "a.json" } else { "b.json" };
        let before = set.record(name);
        if !set.should_attempt(name) {
            continue;
        }

        let after = if op & 2 == 0 {
            set.record_success(name)
        } else {
            set.record_failure(name, max_tries)
        };

        assert!(after.tries >= before.tries);
        assert!(after.tries <= max_tries + 1);
        assert_eq!(after.status == DeliveryStatus::Failed, after.tries > max_tries);
    }
});
