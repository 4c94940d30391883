//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! 장기 실행 모듈(콘솔 컨슈머 등)은 [`Pipeline`]을 구현하여
//! `docktrap-daemon`에서 동일한 생명주기(start/stop/health_check)로 관리됩니다.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::DocktrapError;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이지만 성능 저하 또는 일부 기능 불능
    Degraded(String),
    /// 동작 불능
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 여부를 반환합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 저하 상태인지 여부를 반환합니다.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// 불능 상태인지 여부를 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 장기 실행 모듈의 생명주기 trait
///
/// 상태 전환: `Initialized` → `start()` → `Running` → `stop()` → `Stopped`.
/// 이미 실행 중인 모듈의 `start()`는 [`PipelineError::AlreadyRunning`](crate::error::PipelineError),
/// 실행 중이 아닌 모듈의 `stop()`은 `NotRunning` 에러를 반환해야 합니다.
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 백그라운드 태스크를 스폰할 수 있습니다.
    fn start(&mut self) -> impl Future<Output = Result<(), DocktrapError>> + Send;

    /// 모듈을 정지합니다. Graceful shutdown을 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), DocktrapError>> + Send;

    /// 모듈의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Healthy.is_degraded());
        assert!(HealthStatus::Degraded("slow".to_owned()).is_degraded());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("lagging".to_owned()).to_string(),
            "degraded: lagging"
        );
        assert_eq!(
            HealthStatus::Unhealthy("not started".to_owned()).to_string(),
            "unhealthy: not started"
        );
    }

    #[test]
    fn health_status_serialize_roundtrip() {
        let status = HealthStatus::Degraded("buffer full".to_owned());
        let json = serde_json::to_string(&status).unwrap();
        let back: HealthStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
