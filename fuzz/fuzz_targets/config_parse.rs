#![no_main]

use libfuzzer_sys::fuzz_target;
use nadi_config::{ConfigFormat, parse_config};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for format in [ConfigFormat::Yaml, ConfigFormat::Toml] {
            if let Ok(config) = parse_config(s, format) {
                let _ = config.validate();
            }
        }
    }
});
