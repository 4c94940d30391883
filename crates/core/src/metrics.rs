//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `docktrap_`
//! - 모듈명: `sensor_`, `analyzer_`, `export_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 심각도 레이블 키 (enumeration, exploitation, ignore, unhandled)
pub const LABEL_SEVERITY: &str = "severity";

/// 액션 레이블 키 (docker_containers_create 등)
pub const LABEL_ACTION: &str = "action";

/// 지표 유형 레이블 키 (ip-src, url, md5, sha1, sha256)
pub const LABEL_KIND: &str = "kind";

// ─── Sensor (에뮬레이터) 메트릭 ────────────────────────────────────

/// Sensor: 캡처된 전체 요청 수 (counter)
pub const SENSOR_REQUESTS_CAPTURED_TOTAL: &str = "docktrap_sensor_requests_captured_total";

/// Sensor: 생성된 에뮬레이션 컨테이너 수 (counter)
pub const SENSOR_CONTAINERS_CREATED_TOTAL: &str = "docktrap_sensor_containers_created_total";

/// Sensor: 풀 요청으로 합성된 이미지 수 (counter)
pub const SENSOR_IMAGES_PULLED_TOTAL: &str = "docktrap_sensor_images_pulled_total";

/// Sensor: 생성된 exec 세션 수 (counter)
pub const SENSOR_EXECS_CREATED_TOTAL: &str = "docktrap_sensor_execs_created_total";

// ─── Analyzer 메트릭 ────────────────────────────────────────────────

/// Analyzer: 분류된 이벤트 수 (counter, label: severity)
pub const ANALYZER_EVENTS_TOTAL: &str = "docktrap_analyzer_events_total";

/// Analyzer: 미분류 요청 수 (counter)
pub const ANALYZER_UNHANDLED_TOTAL: &str = "docktrap_analyzer_unhandled_total";

// ─── Export 메트릭 ──────────────────────────────────────────────────

/// Export: 내보낸 지표 수 (counter, label: kind)
pub const EXPORT_INDICATORS_TOTAL: &str = "docktrap_export_indicators_total";

/// Export: 내보내기 실행 수 (counter)
pub const EXPORT_RUNS_TOTAL: &str = "docktrap_export_runs_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "docktrap_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "docktrap_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `docktrap-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        SENSOR_REQUESTS_CAPTURED_TOTAL,
        "Total number of HTTP requests captured by the sensor"
    );
    describe_counter!(
        SENSOR_CONTAINERS_CREATED_TOTAL,
        "Total number of emulated containers created by attackers"
    );
    describe_counter!(
        SENSOR_IMAGES_PULLED_TOTAL,
        "Total number of emulated images synthesized by pull requests"
    );
    describe_counter!(
        SENSOR_EXECS_CREATED_TOTAL,
        "Total number of emulated exec sessions created"
    );

    describe_counter!(
        ANALYZER_EVENTS_TOTAL,
        "Total number of classified security events, by severity"
    );
    describe_counter!(
        ANALYZER_UNHANDLED_TOTAL,
        "Total number of requests that matched no classification rule"
    );

    describe_counter!(
        EXPORT_INDICATORS_TOTAL,
        "Total number of IOC indicators pushed to the threat-intel sink, by kind"
    );
    describe_counter!(EXPORT_RUNS_TOTAL, "Total number of IOC export runs");

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Docktrap daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
