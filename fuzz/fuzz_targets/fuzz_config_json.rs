#![no_main]

use getexeicon::config::ExtractorConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _result: Result<ExtractorConfig, _> = serde_json::from_str(s);
    }
});
