//! 에러 타입 — 도메인별 에러 정의

/// Docktrap 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DocktrapError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 모듈을 다시 시작하려 함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 모듈을 정지하려 함
    #[error("pipeline not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 스토리지 에러
///
/// 캡처 로그나 리소스 저장소의 하부 저장 기술 실패를 나타냅니다.
/// 요청 단위로 치명적이며, 프로세스는 계속 동작해야 합니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 레코드 추가 실패
    #[error("append failed: {0}")]
    Append(String),

    /// 조회 실패
    #[error("query failed: {0}")]
    Query(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "general.log_level".to_owned(),
            reason: "must be one of: trace, debug, info, warn, error".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("general.log_level"));
        assert!(msg.contains("must be one of"));
    }

    #[test]
    fn config_error_converts_to_docktrap_error() {
        let err: DocktrapError = ConfigError::FileNotFound {
            path: "/etc/docktrap/docktrap.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, DocktrapError::Config(_)));
        assert!(err.to_string().contains("docktrap.toml"));
    }

    #[test]
    fn pipeline_error_lifecycle_variants() {
        assert_eq!(
            PipelineError::AlreadyRunning.to_string(),
            "pipeline already running"
        );
        assert_eq!(PipelineError::NotRunning.to_string(), "pipeline not running");
    }

    #[test]
    fn storage_error_converts_to_docktrap_error() {
        let err: DocktrapError = StorageError::Append("disk full".to_owned()).into();
        assert!(matches!(err, DocktrapError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn io_error_converts_to_docktrap_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DocktrapError = io.into();
        assert!(matches!(err, DocktrapError::Io(_)));
    }
}
