//! 설정 관리 — docktrap.toml 파싱 및 런타임 설정
//!
//! [`DocktrapConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOCKTRAP_SENSOR_ID=hp-01` 형식)
//! 3. 설정 파일 (`docktrap.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), docktrap_core::error::DocktrapError> {
//! use docktrap_core::config::DocktrapConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DocktrapConfig::load("docktrap.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DocktrapConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DocktrapError};

/// Docktrap 통합 설정
///
/// `docktrap.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocktrapConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 센서(에뮬레이터) 설정
    #[serde(default)]
    pub sensor: SensorConfig,
    /// 라이브 콘솔 컨슈머 설정
    #[serde(default)]
    pub console: ConsoleConfig,
    /// IOC 일괄 내보내기 설정
    #[serde(default)]
    pub export: ExportConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DocktrapConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DocktrapError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DocktrapError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocktrapError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DocktrapError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DocktrapError> {
        toml::from_str(toml_str).map_err(|e| {
            DocktrapError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOCKTRAP_{SECTION}_{FIELD}`
    /// 예: `DOCKTRAP_SENSOR_PORT=2376`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOCKTRAP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOCKTRAP_GENERAL_LOG_FORMAT");

        // Sensor
        override_string(&mut self.sensor.id, "DOCKTRAP_SENSOR_ID");
        override_string(&mut self.sensor.listen_addr, "DOCKTRAP_SENSOR_LISTEN_ADDR");
        override_u16(&mut self.sensor.port, "DOCKTRAP_SENSOR_PORT");
        override_bool(&mut self.sensor.seed_defaults, "DOCKTRAP_SENSOR_SEED_DEFAULTS");
        override_u64(&mut self.sensor.pull_delay_ms, "DOCKTRAP_SENSOR_PULL_DELAY_MS");
        override_usize(
            &mut self.sensor.capture_capacity,
            "DOCKTRAP_SENSOR_CAPTURE_CAPACITY",
        );

        // Console
        override_bool(&mut self.console.enabled, "DOCKTRAP_CONSOLE_ENABLED");

        // Export
        override_bool(&mut self.export.enabled, "DOCKTRAP_EXPORT_ENABLED");
        override_u64(&mut self.export.interval_secs, "DOCKTRAP_EXPORT_INTERVAL_SECS");
        override_u64(&mut self.export.window_secs, "DOCKTRAP_EXPORT_WINDOW_SECS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "DOCKTRAP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "DOCKTRAP_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "DOCKTRAP_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DocktrapError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.sensor.id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sensor.id".to_owned(),
                reason: "sensor id must not be empty".to_owned(),
            }
            .into());
        }

        if self.sensor.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sensor.port".to_owned(),
                reason: "port must be non-zero".to_owned(),
            }
            .into());
        }

        if self.sensor.capture_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sensor.capture_capacity".to_owned(),
                reason: "capture channel capacity must be non-zero".to_owned(),
            }
            .into());
        }

        if self.export.enabled {
            if self.export.interval_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "export.interval_secs".to_owned(),
                    reason: "interval must be non-zero when export is enabled".to_owned(),
                }
                .into());
            }
            if self.export.window_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "export.window_secs".to_owned(),
                    reason: "window must be non-zero when export is enabled".to_owned(),
                }
                .into());
            }
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "only '/metrics' is currently supported".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 센서(에뮬레이터) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// 센서 고유 ID — 모든 저장 레코드에 스탬프됩니다
    pub id: String,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트 (실제 Docker 데몬과 동일한 2375가 기본)
    pub port: u16,
    /// 시작 시 기본 이미지/컨테이너 시드 여부
    pub seed_defaults: bool,
    /// 이미지 풀 스트림의 Downloading 프레임 간 인공 지연 (밀리초)
    pub pull_delay_ms: u64,
    /// 캡처 change feed 채널 용량
    pub capture_capacity: usize,
    /// 모든 응답에 덧붙이는 모방 헤더 (실제 데몬의 헤더 흉내)
    pub headers: BTreeMap<String, String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Server".to_owned(), "Docker/20.10.14 (linux)".to_owned());
        headers.insert("Api-Version".to_owned(), "1.41".to_owned());
        headers.insert("Docker-Experimental".to_owned(), "false".to_owned());
        headers.insert("Ostype".to_owned(), "linux".to_owned());
        Self {
            id: "docktrap-01".to_owned(),
            listen_addr: "0.0.0.0".to_owned(),
            port: 2375,
            seed_defaults: true,
            pull_delay_ms: 1000,
            capture_capacity: 1024,
            headers,
        }
    }
}

/// 라이브 콘솔 컨슈머 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// 활성화 여부
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// IOC 일괄 내보내기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// 주기적 내보내기 활성화 여부
    pub enabled: bool,
    /// 내보내기 실행 주기 (초)
    pub interval_secs: u64,
    /// 한 번에 조회하는 시간 윈도우 (초)
    pub window_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 1800,
            window_secs: 1800,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 엔드포인트
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = DocktrapConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.sensor.id, "docktrap-01");
        assert_eq!(config.sensor.port, 2375);
        assert!(config.sensor.seed_defaults);
        assert!(config.console.enabled);
        assert!(!config.export.enabled);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = DocktrapConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn default_headers_mimic_docker() {
        let config = DocktrapConfig::default();
        assert_eq!(
            config.sensor.headers.get("Server").map(String::as_str),
            Some("Docker/20.10.14 (linux)")
        );
        assert_eq!(
            config.sensor.headers.get("Api-Version").map(String::as_str),
            Some("1.41")
        );
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = DocktrapConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.sensor.port, 2375);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[sensor]
id = "hp-east-1"
port = 2376
"#;
        let config = DocktrapConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.sensor.id, "hp-east-1");
        assert_eq!(config.sensor.port, 2376);
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"

[sensor]
id = "hp-02"
listen_addr = "127.0.0.1"
port = 12375
seed_defaults = false
pull_delay_ms = 250
capture_capacity = 4096

[sensor.headers]
Server = "Docker/24.0.2 (linux)"
Api-Version = "1.43"

[console]
enabled = false

[export]
enabled = true
interval_secs = 600
window_secs = 900

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9900
"#;
        let config = DocktrapConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.sensor.pull_delay_ms, 250);
        assert_eq!(
            config.sensor.headers.get("Api-Version").map(String::as_str),
            Some("1.43")
        );
        assert!(!config.console.enabled);
        assert!(config.export.enabled);
        assert_eq!(config.export.window_secs, 900);
        assert_eq!(config.metrics.port, 9900);
        config.validate().unwrap();
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = DocktrapConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DocktrapError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DocktrapConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = DocktrapConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_sensor_id() {
        let mut config = DocktrapConfig::default();
        config.sensor.id = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensor.id"));
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = DocktrapConfig::default();
        config.sensor.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensor.port"));
    }

    #[test]
    fn validate_rejects_zero_export_interval_when_enabled() {
        let mut config = DocktrapConfig::default();
        config.export.enabled = true;
        config.export.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn validate_accepts_zero_export_interval_when_disabled() {
        let mut config = DocktrapConfig::default();
        config.export.enabled = false;
        config.export.interval_secs = 0;
        // export가 비활성화 상태면 검증을 건너뜀
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unknown_metrics_endpoint() {
        let mut config = DocktrapConfig::default();
        config.metrics.enabled = true;
        config.metrics.endpoint = "/stats".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut config = DocktrapConfig::default();
        // SAFETY: serial 테스트라 환경변수 조작이 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("DOCKTRAP_SENSOR_ID", "from-env") };
        config.apply_env_overrides();
        assert_eq!(config.sensor.id, "from-env");
        unsafe { std::env::remove_var("DOCKTRAP_SENSOR_ID") };
    }

    #[test]
    #[serial]
    fn env_override_u16() {
        let mut config = DocktrapConfig::default();
        // SAFETY: serial 테스트라 환경변수 조작이 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("DOCKTRAP_SENSOR_PORT", "12345") };
        config.apply_env_overrides();
        assert_eq!(config.sensor.port, 12345);
        unsafe { std::env::remove_var("DOCKTRAP_SENSOR_PORT") };
    }

    #[test]
    #[serial]
    fn env_override_invalid_bool_keeps_original() {
        let mut config = DocktrapConfig::default();
        // SAFETY: serial 테스트라 환경변수 조작이 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("DOCKTRAP_CONSOLE_ENABLED", "not-a-bool") };
        config.apply_env_overrides();
        assert!(config.console.enabled); // 원래 값 유지
        unsafe { std::env::remove_var("DOCKTRAP_CONSOLE_ENABLED") };
    }

    #[test]
    #[serial]
    fn env_override_missing_var_keeps_original() {
        let mut config = DocktrapConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.sensor.id, "docktrap-01");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DocktrapConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = DocktrapConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.sensor.id, parsed.sensor.id);
        assert_eq!(config.export.interval_secs, parsed.export.interval_secs);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = DocktrapConfig::from_file("/nonexistent/path/docktrap.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DocktrapError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docktrap.toml");
        tokio::fs::write(&path, "[sensor]\nid = \"file-sensor\"\n")
            .await
            .unwrap();
        let config = DocktrapConfig::from_file(&path).await.unwrap();
        assert_eq!(config.sensor.id, "file-sensor");
    }
}
