//! 분석기 에러 타입
//!
//! [`AnalyzerError`]는 분류/추출/내보내기 경로의 모든 에러를 표현합니다.
//! `Archive`는 공격자가 보낸 빌드 컨텍스트가 깨진 경우로, 호출자는
//! 로그만 남기고 계속 진행해야 합니다 — 분류 자체는 절대 실패하지 않습니다.

use docktrap_core::error::{DocktrapError, PipelineError};

/// 분석기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// 빌드 컨텍스트가 유효한 (gzip 래핑 가능한) tar 스트림이 아님
    #[error("archive error: {0}")]
    Archive(String),

    /// 지표 싱크 호출 실패
    #[error("export error: {0}")]
    Export(String),

    /// 캡처 로그 조회 실패
    #[error("capture log error: {0}")]
    Log(String),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<AnalyzerError> for DocktrapError {
    fn from(err: AnalyzerError) -> Self {
        DocktrapError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_error_display() {
        let err = AnalyzerError::Archive("not a tar stream".to_owned());
        assert!(err.to_string().contains("not a tar stream"));
    }

    #[test]
    fn export_error_display() {
        let err = AnalyzerError::Export("sink unreachable".to_owned());
        assert!(err.to_string().contains("sink unreachable"));
    }

    #[test]
    fn converts_to_docktrap_error() {
        let err: DocktrapError = AnalyzerError::Channel("receiver closed".to_owned()).into();
        assert!(matches!(err, DocktrapError::Pipeline(_)));
    }
}
