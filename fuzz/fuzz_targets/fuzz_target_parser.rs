#![no_main]

use fleetctl::config::parse_targets;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let parsed = parse_targets(content, 16);
        assert!(parsed.table.len() <= 16);
        for target in parsed.table.iter() {
            assert!(target.x.is_finite() && target.y.is_finite() && target.z.is_finite());
        }
    }
});
