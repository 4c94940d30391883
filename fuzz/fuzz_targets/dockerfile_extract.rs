#![no_main]

use libfuzzer_sys::fuzz_target;

use docktrap_analyzer::extract_dockerfile;

fuzz_target!(|data: &[u8]| {
    // 깨진 아카이브는 Archive 에러일 뿐, 패닉이면 안 됩니다.
    let _ = extract_dockerfile(data);
});
