//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.
//! 에뮬레이터는 [`CapturedRequest`]를 기록하고, 분석기는 이를 읽어
//! 심각도 분류([`Severity`])와 IOC 지표([`Indicator`])를 생성합니다.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 심각도 분류
///
/// 분류기가 모든 요청에 부여하는 대응 우선순위 버킷입니다.
/// `Ignore`는 무해한 노이즈, `Unhandled`는 아직 규칙이 없는 요청을 뜻합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정찰 단계 — 데몬/컨테이너/이미지 목록 조회
    Enumeration,
    /// 공격 단계 — 컨테이너 생성, 이미지 풀, exec, 파일 업로드 등
    Exploitation,
    /// 무해한 노이즈 — 로깅 없이 버려도 되는 요청
    Ignore,
    /// 미분류 — 규칙에 걸리지 않은 요청, 규칙 작성을 위해 원문을 보존
    #[default]
    Unhandled,
}

impl Severity {
    /// 공격 단계 요청인지 여부를 반환합니다.
    pub fn is_exploitation(self) -> bool {
        self == Self::Exploitation
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enumeration => write!(f, "enumeration"),
            Self::Exploitation => write!(f, "exploitation"),
            Self::Ignore => write!(f, "ignore"),
            Self::Unhandled => write!(f, "unhandled"),
        }
    }
}

/// 캡처된 HTTP 요청
///
/// 센서에 수신된 요청 전문을 그대로 보존하는 append-only 레코드입니다.
/// `seq`는 캡처 로그가 추가 시점에 부여하는 단조 증가 번호이며,
/// 한 번 기록된 레코드는 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// 캡처 로그가 부여한 순번 (센서별 append 순서)
    pub seq: u64,
    /// 수신 시각
    pub timestamp: SystemTime,
    /// 센서 ID
    pub sensor_id: String,
    /// 센서 유형 (항상 "Docker")
    pub sensor_type: String,
    /// HTTP 메서드
    pub method: String,
    /// 요청 경로 (쿼리 제외)
    pub path: String,
    /// Host 헤더 (포트 제외)
    pub host: String,
    /// 쿼리 인자 (key-value 쌍, 수신 순서 보존)
    pub args: Vec<(String, String)>,
    /// 전체 요청 URL
    pub url: String,
    /// 요청 헤더 (key-value 쌍)
    pub headers: Vec<(String, String)>,
    /// JSON으로 파싱된 본문 (JSON이 아니면 None)
    pub body_json: Option<serde_json::Value>,
    /// 원시 본문 바이트
    pub body: Bytes,
    /// 출발지 IP
    pub source_ip: IpAddr,
}

impl CapturedRequest {
    /// 쿼리 인자 값을 조회합니다.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 요청 헤더 값을 조회합니다 (키 대소문자 무시).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CapturedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} from {}",
            self.seq, self.sensor_id, self.method, self.path, self.source_ip,
        )
    }
}

/// IOC 지표 유형
///
/// 위협 인텔리전스 싱크가 받아들이는 속성 유형과 일치합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    /// 출발지 IP
    IpSrc,
    /// URL
    Url,
    /// MD5 해시
    Md5,
    /// SHA-1 해시
    Sha1,
    /// SHA-256 해시
    Sha256,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpSrc => write!(f, "ip-src"),
            Self::Url => write!(f, "url"),
            Self::Md5 => write!(f, "md5"),
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// IOC 지표
///
/// 공격자 페이로드에서 추출되어 위협 인텔리전스 싱크로 내보내는 단위입니다.
/// `(kind, value)` 쌍이 중복 제거 키입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    /// 지표 유형
    pub kind: IndicatorKind,
    /// 지표 값 (IP 문자열, URL, 해시)
    pub value: String,
    /// 출처 설명 (원본 요청 요약)
    pub comment: String,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CapturedRequest {
        CapturedRequest {
            seq: 7,
            timestamp: SystemTime::now(),
            sensor_id: "sensor-01".to_owned(),
            sensor_type: "Docker".to_owned(),
            method: "GET".to_owned(),
            path: "/v1.41/containers/json".to_owned(),
            host: "10.0.0.9".to_owned(),
            args: vec![("all".to_owned(), "1".to_owned())],
            url: "http://10.0.0.9:2375/v1.41/containers/json?all=1".to_owned(),
            headers: vec![("User-Agent".to_owned(), "Docker-Client/20.10.14".to_owned())],
            body_json: None,
            body: Bytes::new(),
            source_ip: "192.0.2.15".parse().unwrap(),
        }
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Enumeration.to_string(), "enumeration");
        assert_eq!(Severity::Exploitation.to_string(), "exploitation");
        assert_eq!(Severity::Ignore.to_string(), "ignore");
        assert_eq!(Severity::Unhandled.to_string(), "unhandled");
    }

    #[test]
    fn severity_default_is_unhandled() {
        assert_eq!(Severity::default(), Severity::Unhandled);
    }

    #[test]
    fn severity_is_exploitation() {
        assert!(Severity::Exploitation.is_exploitation());
        assert!(!Severity::Enumeration.is_exploitation());
        assert!(!Severity::Ignore.is_exploitation());
    }

    #[test]
    fn severity_serialize_roundtrip() {
        let json = serde_json::to_string(&Severity::Exploitation).unwrap();
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::Exploitation);
    }

    #[test]
    fn request_arg_lookup() {
        let req = sample_request();
        assert_eq!(req.arg("all"), Some("1"));
        assert_eq!(req.arg("missing"), None);
    }

    #[test]
    fn request_header_lookup_is_case_insensitive() {
        let req = sample_request();
        assert_eq!(req.header("user-agent"), Some("Docker-Client/20.10.14"));
        assert_eq!(req.header("USER-AGENT"), Some("Docker-Client/20.10.14"));
        assert_eq!(req.header("X-Missing"), None);
    }

    #[test]
    fn request_display() {
        let display = sample_request().to_string();
        assert!(display.contains("#7"));
        assert!(display.contains("GET"));
        assert!(display.contains("192.0.2.15"));
    }

    #[test]
    fn indicator_kind_display_matches_sink_types() {
        assert_eq!(IndicatorKind::IpSrc.to_string(), "ip-src");
        assert_eq!(IndicatorKind::Url.to_string(), "url");
        assert_eq!(IndicatorKind::Md5.to_string(), "md5");
        assert_eq!(IndicatorKind::Sha1.to_string(), "sha1");
        assert_eq!(IndicatorKind::Sha256.to_string(), "sha256");
    }

    #[test]
    fn indicator_display() {
        let indicator = Indicator {
            kind: IndicatorKind::Url,
            value: "http://198.51.100.4/x.sh".to_owned(),
            comment: "container create Cmd".to_owned(),
        };
        assert_eq!(indicator.to_string(), "url=http://198.51.100.4/x.sh");
    }

    #[test]
    fn requests_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<CapturedRequest>();
        assert_send_sync::<Indicator>();
    }
}
