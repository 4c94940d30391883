//! 에뮬레이션 에러 타입
//!
//! [`EmulationError`]는 에뮬레이션 내부에서 발생하는 모든 에러를 표현합니다.
//! 리소스 부재 에러(`NoSuchImage`/`NoSuchContainer`/`NoSuchExec`)는
//! 실제 Docker 데몬과 글자 단위로 동일한 404 본문으로 매핑됩니다 —
//! Docker 클라이언트가 이 메시지를 파싱하기 때문입니다.

use docktrap_core::error::{DocktrapError, PipelineError, StorageError};

/// 에뮬레이션 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EmulationError {
    /// 참조한 이미지가 저장소에 없음
    #[error("no such image: {0}")]
    NoSuchImage(String),

    /// 참조한 컨테이너가 저장소에 없음
    #[error("no such container: {0}")]
    NoSuchContainer(String),

    /// 참조한 exec 세션이 저장소에 없음
    #[error("no such exec: {0}")]
    NoSuchExec(String),

    /// 컨테이너 이름 충돌
    #[error("container name already in use: {0}")]
    NameConflict(String),

    /// 하부 저장소 실패
    #[error("store error: {0}")]
    Store(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl EmulationError {
    /// 이 에러가 매핑되는 HTTP 상태 코드를 반환합니다.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoSuchImage(_) | Self::NoSuchContainer(_) | Self::NoSuchExec(_) => 404,
            Self::NameConflict(_) => 409,
            Self::Store(_) | Self::Config { .. } => 500,
        }
    }

    /// 클라이언트에 보내는 `message` 본문을 반환합니다.
    ///
    /// 404 계열은 실제 데몬의 포맷(`No such <kind>: <ref>`)을 그대로 따릅니다.
    pub fn client_message(&self) -> String {
        match self {
            Self::NoSuchImage(reference) => format!("No such image: {reference}"),
            Self::NoSuchContainer(reference) => format!("No such container: {reference}"),
            Self::NoSuchExec(reference) => format!("No such exec instance: {reference}"),
            Self::NameConflict(name) => {
                format!("Conflict. The container name \"{name}\" is already in use")
            }
            Self::Store(_) | Self::Config { .. } => "server error".to_owned(),
        }
    }
}

impl From<EmulationError> for DocktrapError {
    fn from(err: EmulationError) -> Self {
        match &err {
            EmulationError::Store(msg) => {
                DocktrapError::Storage(StorageError::Query(msg.clone()))
            }
            EmulationError::Config { .. } => DocktrapError::Pipeline(PipelineError::InitFailed(
                err.to_string(),
            )),
            _ => DocktrapError::Storage(StorageError::Query(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_image_maps_to_404_with_exact_message() {
        let err = EmulationError::NoSuchImage("['nginx:latest']".to_owned());
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.client_message(), "No such image: ['nginx:latest']");
    }

    #[test]
    fn no_such_container_maps_to_404_with_exact_message() {
        let err = EmulationError::NoSuchContainer("061ee0bfdb4c".to_owned());
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.client_message(), "No such container: 061ee0bfdb4c");
    }

    #[test]
    fn no_such_exec_maps_to_404() {
        let err = EmulationError::NoSuchExec("abc123".to_owned());
        assert_eq!(err.http_status(), 404);
        assert!(err.client_message().contains("abc123"));
    }

    #[test]
    fn name_conflict_maps_to_409() {
        let err = EmulationError::NameConflict("/web".to_owned());
        assert_eq!(err.http_status(), 409);
        assert!(err.client_message().contains("/web"));
    }

    #[test]
    fn store_error_maps_to_500_without_leaking_detail() {
        let err = EmulationError::Store("lock poisoned".to_owned());
        assert_eq!(err.http_status(), 500);
        // 내부 사유는 클라이언트 메시지에 노출하지 않음
        assert_eq!(err.client_message(), "server error");
    }

    #[test]
    fn converts_to_docktrap_error() {
        let err: DocktrapError = EmulationError::Store("backend down".to_owned()).into();
        assert!(matches!(err, DocktrapError::Storage(_)));
    }
}
