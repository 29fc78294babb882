#![no_main]

use getexeicon::container::IconDirectory;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(directory) = IconDirectory::parse(data) {
        // Payloads are read out of the buffer itself
        for entry in &directory.entries {
            assert!(entry.size() <= data.len());
        }
    }
});
