//! 에뮬레이션 설정
//!
//! [`EmulationConfig`]는 core의 [`SensorConfig`](docktrap_core::config::SensorConfig)를
//! 기반으로 에뮬레이터 전용 설정을 제공합니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EmulationError;

/// 에뮬레이션 설정
///
/// core의 `SensorConfig`에서 파생되며, 응답 합성에 필요한 값만 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulationConfig {
    /// 센서 고유 ID
    pub sensor_id: String,
    /// 모든 응답에 덧붙이는 모방 헤더
    pub mimic_headers: Vec<(String, String)>,
    /// 시작 시 기본 이미지/컨테이너 시드 여부
    pub seed_defaults: bool,
    /// 이미지 풀 스트림의 Downloading 프레임 간 인공 지연
    pub pull_delay_ms: u64,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self::from_core(&docktrap_core::config::SensorConfig::default())
    }
}

impl EmulationConfig {
    /// core의 `SensorConfig`에서 에뮬레이션 설정을 생성합니다.
    pub fn from_core(core: &docktrap_core::config::SensorConfig) -> Self {
        Self {
            sensor_id: core.id.clone(),
            mimic_headers: core
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            seed_defaults: core.seed_defaults,
            pull_delay_ms: core.pull_delay_ms,
        }
    }

    /// Downloading 프레임 사이 지연을 `Duration`으로 반환합니다.
    pub fn pull_delay(&self) -> Duration {
        Duration::from_millis(self.pull_delay_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EmulationError> {
        if self.sensor_id.is_empty() {
            return Err(EmulationError::Config {
                field: "sensor_id".to_owned(),
                reason: "sensor id must not be empty".to_owned(),
            });
        }
        // 지연이 지나치게 길면 스캐너가 타임아웃으로 끊어버립니다.
        if self.pull_delay_ms > 10_000 {
            return Err(EmulationError::Config {
                field: "pull_delay_ms".to_owned(),
                reason: "must be 0-10000".to_owned(),
            });
        }
        Ok(())
    }
}
