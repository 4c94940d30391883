//! 요청 분류기 — 캡처된 요청을 타입 있는 보안 이벤트로 변환
//!
//! 규칙은 명시적인 순서 있는 `(조건, 액션)` 목록이며 위에서 아래로
//! 평가되어 첫 매치가 이깁니다. 뒤쪽 규칙은 의도적으로 덜 구체적인
//! 폴백이므로 이 전체 순서 자체가 계약입니다 — 해시 기반 디스패치로
//! 바꾸면 안 됩니다.
//!
//! 분류는 순수 읽기입니다. 추출 실패(깨진 빌드 아카이브 등)는 이벤트를
//! 퇴화시킬 뿐 분류를 중단시키지 않으며, 분류기는 절대 에러를 내지
//! 않습니다 — 예상 밖의 요청은 `Unhandled`로 수렴합니다.

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use docktrap_core::types::{CapturedRequest, Severity};

use crate::extract::{extract_dockerfile, extract_urls};

// 버전 경로 패턴 — 원본 분석기의 정규식과 동일한 모양입니다.
static CONTAINERS_WILD_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v[\d.]*/containers/.*/json").expect("pattern is a compile-time constant")
});
static IMAGES_WILD_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v[\d.]*/images/.*/json").expect("pattern is a compile-time constant")
});
static CONTAINER_ID_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v[\d.]*/containers/[0-9A-Za-z_]*/json")
        .expect("pattern is a compile-time constant")
});
static EXEC_ID_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v[\d.]*/exec/[0-9A-Za-z_]*/json").expect("pattern is a compile-time constant")
});

/// 분류된 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// 데몬 버전/정보 조회
    ServiceEnumeration,
    /// 컨테이너 목록 조회
    ContainersEnumeration,
    /// 이미지 목록 조회
    ImagesEnumeration,
    /// HEAD로 컨테이너 내 파일 존재 확인
    ContainerFileCheck,
    /// 컨테이너로 파일 업로드
    ContainerFileUpload,
    /// 컨테이너 생성 시도
    ContainersCreate,
    /// 이미지 풀 시도
    ImagesCreate,
    /// exec 세션 생성
    ContainerExec,
    /// 컨테이너 삭제
    ContainerDelete,
    /// 컨테이너 kill
    ContainerKill,
    /// 단일 컨테이너 inspect
    ContainerEnumeration,
    /// 빌드 컨텍스트 제출
    ContainerBuild,
    /// 무해한 노이즈 (start/attach/resize/events 등)
    Other,
    /// 어떤 규칙에도 걸리지 않음
    Unhandled,
}

impl Action {
    /// 이 액션의 심각도 분류를 반환합니다.
    pub fn severity(self) -> Severity {
        match self {
            Self::ServiceEnumeration
            | Self::ContainersEnumeration
            | Self::ImagesEnumeration
            | Self::ContainerFileCheck
            | Self::ContainerEnumeration => Severity::Enumeration,
            Self::ContainerFileUpload
            | Self::ContainersCreate
            | Self::ImagesCreate
            | Self::ContainerExec
            | Self::ContainerDelete
            | Self::ContainerKill
            | Self::ContainerBuild => Severity::Exploitation,
            Self::Other => Severity::Ignore,
            Self::Unhandled => Severity::Unhandled,
        }
    }

    /// 로그와 메트릭 레이블에 쓰는 안정적인 액션 이름입니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceEnumeration => "docker_service_enumeration",
            Self::ContainersEnumeration => "docker_containers_enumeration",
            Self::ImagesEnumeration => "docker_images_enumeration",
            Self::ContainerFileCheck => "docker_container_file_check",
            Self::ContainerFileUpload => "docker_container_file_upload",
            Self::ContainersCreate => "docker_containers_create",
            Self::ImagesCreate => "docker_images_create",
            Self::ContainerExec => "docker_container_exec",
            Self::ContainerDelete => "docker_container_delete",
            Self::ContainerKill => "docker_container_kill",
            Self::ContainerEnumeration => "docker_container_enumeration",
            Self::ContainerBuild => "docker_container_build",
            Self::Other => "other",
            Self::Unhandled => "unhandled",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 페이로드에서 추출된 구조화 아티팩트
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// 공백으로 합친 Cmd
    pub cmd: Option<String>,
    /// 공백으로 합친 Entrypoint
    pub entrypoint: Option<String>,
    /// 이미지 이름
    pub image: Option<String>,
    /// 이미지 태그
    pub tag: Option<String>,
    /// 환경 변수
    pub env: Option<Vec<String>>,
    /// 추출된 URL (처음 본 순서, 중복 제거)
    pub urls: Vec<String>,
    /// 빌드 컨텍스트의 Dockerfile 본문
    pub dockerfile: Option<String>,
    /// HEAD archive 프로브가 확인한 파일 경로
    pub file_path: Option<String>,
    /// PUT archive 업로드의 대상 디렉토리
    pub dir_path: Option<String>,
}

impl Extracted {
    /// 모든 필드가 비어 있는지 여부를 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.cmd.is_none()
            && self.entrypoint.is_none()
            && self.image.is_none()
            && self.tag.is_none()
            && self.env.is_none()
            && self.urls.is_empty()
            && self.dockerfile.is_none()
            && self.file_path.is_none()
            && self.dir_path.is_none()
    }
}

impl fmt::Display for Extracted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut field = |f: &mut fmt::Formatter<'_>, name: &str, value: &str| -> fmt::Result {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{name}={value}")
        };
        if let Some(image) = &self.image {
            field(f, "image", image)?;
        }
        if let Some(tag) = &self.tag {
            field(f, "tag", tag)?;
        }
        if let Some(cmd) = &self.cmd {
            field(f, "cmd", &format!("{cmd:?}"))?;
        }
        if let Some(entrypoint) = &self.entrypoint {
            field(f, "entrypoint", &format!("{entrypoint:?}"))?;
        }
        if let Some(env) = &self.env {
            field(f, "env", &format!("{env:?}"))?;
        }
        if !self.urls.is_empty() {
            field(f, "urls", &format!("{:?}", self.urls))?;
        }
        if let Some(path) = &self.file_path {
            field(f, "file_path", path)?;
        }
        if let Some(path) = &self.dir_path {
            field(f, "dir_path", path)?;
        }
        if self.dockerfile.is_some() {
            field(f, "dockerfile", "present")?;
        }
        Ok(())
    }
}

/// 분류된 보안 이벤트
///
/// 분류기의 순수 함수 출력이며 독립적인 생명주기는 없습니다.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    /// 분류된 액션
    pub action: Action,
    /// 심각도
    pub severity: Severity,
    /// 원본 요청 수신 시각
    pub timestamp: SystemTime,
    /// 원본 요청 출발지 IP
    pub source_ip: IpAddr,
    /// 원본 요청 메서드
    pub method: String,
    /// 원본 요청 경로
    pub path: String,
    /// 추출된 아티팩트
    pub extracted: Extracted,
}

// 순서 있는 규칙 목록. 표의 우선순위 그대로이며, 여기의 순서가 곧 계약입니다.
type Predicate = fn(&CapturedRequest) -> bool;
static RULES: &[(Predicate, Action)] = &[
    (is_service_enum, Action::ServiceEnumeration),
    (is_containers_enum, Action::ContainersEnumeration),
    (is_images_enum, Action::ImagesEnumeration),
    (is_file_check, Action::ContainerFileCheck),
    (is_file_upload, Action::ContainerFileUpload),
    (is_container_create, Action::ContainersCreate),
    (is_image_create, Action::ImagesCreate),
    (is_exec_create, Action::ContainerExec),
    (is_container_delete, Action::ContainerDelete),
    (is_container_kill, Action::ContainerKill),
    (is_container_enum, Action::ContainerEnumeration),
    (is_build, Action::ContainerBuild),
    (is_noise, Action::Other),
];

fn is_service_enum(req: &CapturedRequest) -> bool {
    let p = req.path.as_str();
    p.ends_with("/_ping") || p.ends_with("/version") || p.ends_with("/info")
}

fn is_containers_enum(req: &CapturedRequest) -> bool {
    req.path.ends_with("/containers/json") || CONTAINERS_WILD_JSON.is_match(&req.path)
}

fn is_images_enum(req: &CapturedRequest) -> bool {
    req.path.ends_with("/images/json") || IMAGES_WILD_JSON.is_match(&req.path)
}

fn is_file_check(req: &CapturedRequest) -> bool {
    req.method == "HEAD" && req.path.contains("archive")
}

fn is_file_upload(req: &CapturedRequest) -> bool {
    req.method == "PUT" && req.path.contains("archive")
}

fn is_container_create(req: &CapturedRequest) -> bool {
    req.path.ends_with("/containers/create")
}

fn is_image_create(req: &CapturedRequest) -> bool {
    req.path.ends_with("/images/create")
}

fn is_exec_create(req: &CapturedRequest) -> bool {
    req.path.ends_with("/exec")
}

fn is_container_delete(req: &CapturedRequest) -> bool {
    req.method == "DELETE" && req.path.contains("containers")
}

fn is_container_kill(req: &CapturedRequest) -> bool {
    req.path.ends_with("/kill")
}

fn is_container_enum(req: &CapturedRequest) -> bool {
    CONTAINER_ID_JSON.is_match(&req.path)
}

fn is_build(req: &CapturedRequest) -> bool {
    req.path.ends_with("/build")
}

fn is_noise(req: &CapturedRequest) -> bool {
    let p = req.path.as_str();
    p.ends_with("/start")
        || p.ends_with("/attach")
        || p.ends_with("/resize")
        || p.ends_with("/events")
        || p == "/"
        || p == "/favicon.ico"
        || EXEC_ID_JSON.is_match(p)
}

/// 요청을 분류합니다. 절대 실패하지 않습니다.
pub fn classify(req: &CapturedRequest) -> ClassifiedEvent {
    let action = RULES
        .iter()
        .find(|(predicate, _)| predicate(req))
        .map(|(_, action)| *action)
        .unwrap_or(Action::Unhandled);

    ClassifiedEvent {
        action,
        severity: action.severity(),
        timestamp: req.timestamp,
        source_ip: req.source_ip,
        method: req.method.clone(),
        path: req.path.clone(),
        extracted: enrich(action, req),
    }
}

/// 액션별 아티팩트 추출. 누락/오형 필드는 조용히 건너뜁니다.
fn enrich(action: Action, req: &CapturedRequest) -> Extracted {
    let mut extracted = Extracted::default();
    match action {
        Action::ContainersCreate => {
            let body = req.body_json.as_ref();
            extracted.cmd = body.and_then(|b| joined_field(b, "Cmd"));
            extracted.entrypoint = body.and_then(|b| joined_field(b, "Entrypoint"));
            extracted.image = body.and_then(|b| string_field(b, "Image"));
            extracted.env = body.and_then(|b| string_list_field(b, "Env"));

            let mut urls = Vec::new();
            if let Some(cmd) = &extracted.cmd {
                urls.extend(extract_urls(cmd));
            }
            if let Some(entrypoint) = &extracted.entrypoint {
                urls.extend(extract_urls(entrypoint));
            }
            extracted.urls = dedup(urls);
        }
        Action::ImagesCreate => {
            extracted.image = req.arg("fromImage").map(str::to_owned);
            extracted.tag = req.arg("tag").map(str::to_owned);
        }
        Action::ContainerExec => {
            extracted.cmd = req.body_json.as_ref().and_then(|b| joined_field(b, "Cmd"));
            if let Some(cmd) = &extracted.cmd {
                extracted.urls = extract_urls(cmd);
            }
        }
        Action::ContainerFileCheck => {
            extracted.file_path = req.arg("path").map(str::to_owned);
        }
        Action::ContainerFileUpload => {
            extracted.dir_path = req.arg("path").map(str::to_owned);
        }
        Action::ContainerBuild => match extract_dockerfile(&req.body) {
            Ok(dockerfile) => {
                extracted.urls = extract_urls(&dockerfile);
                extracted.dockerfile = Some(dockerfile);
            }
            Err(err) => {
                // 고의로 깨뜨린 컨텍스트일 수 있습니다. 이벤트만 퇴화시킵니다.
                debug!(error = %err, source_ip = %req.source_ip, "build context not readable");
            }
        },
        _ => {}
    }
    extracted
}

/// `"Cmd": ["a","b"]` 또는 `"Cmd": "a b"` 를 공백으로 합친 문자열로 읽습니다.
fn joined_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::Array(parts) => {
            let joined: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join(" "))
            }
        }
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn string_list_field(body: &Value, key: &str) -> Option<Vec<String>> {
    let list: Vec<String> = body
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();
    if list.is_empty() { None } else { Some(list) }
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
