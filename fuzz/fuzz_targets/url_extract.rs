#![no_main]

use libfuzzer_sys::fuzz_target;

use docktrap_analyzer::extract_urls;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = extract_urls(text);
    }
});
