#![no_main]

use getexeicon::encoder::encode;
use getexeicon::reader::parse_icon_groups;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must produce groups or an error, never a panic
    if let Ok(groups) = parse_icon_groups(data) {
        if let Some(group) = groups.first() {
            // Dimensions come from untrusted headers; only verbatim encoding is exercised
            let _ = encode(&group.variants, true);
        }
    }
});
