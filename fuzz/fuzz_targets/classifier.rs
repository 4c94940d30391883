#![no_main]

use std::time::SystemTime;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use docktrap_analyzer::classify;
use docktrap_core::types::CapturedRequest;

#[derive(Debug, Arbitrary)]
struct FuzzRequest {
    method: String,
    path: String,
    args: Vec<(String, String)>,
    body: Vec<u8>,
}

fuzz_target!(|input: FuzzRequest| {
    let body_json = serde_json::from_slice(&input.body).ok();
    let request = CapturedRequest {
        seq: 0,
        timestamp: SystemTime::now(),
        sensor_id: "fuzz".to_owned(),
        sensor_type: "Docker".to_owned(),
        method: input.method,
        path: input.path,
        host: "fuzz".to_owned(),
        args: input.args,
        url: String::new(),
        headers: Vec::new(),
        body_json,
        body: bytes::Bytes::from(input.body),
        source_ip: "127.0.0.1".parse().unwrap(),
    };
    // 분류기는 전면적입니다: 어떤 입력에서도 이벤트가 나와야 합니다.
    let _ = classify(&request);
});
