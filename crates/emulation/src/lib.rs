//! Docktrap 에뮬레이션 크레이트 — Docker Engine API 기만 표면
//!
//! # 모듈 구성
//!
//! - [`store`]: 이미지/컨테이너/exec 세션의 권위 있는 상태 ([`ResourceStore`])
//! - [`template`]: 불변 기본값 구조체와 레코드 빌더
//! - [`responder`]: 엔드포인트 디스패치와 응답 합성 ([`EmulationResponder`])
//! - [`response`]: 프레임워크 독립 응답 타입 ([`EmulatedResponse`])
//! - [`names`]: 64자 hex 토큰과 docker 스타일 컨테이너 이름 생성
//! - [`config`]: 에뮬레이션 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! CapturedRequest -> EmulationResponder -> ResourceStore
//!                          |                (validate + mutate)
//!                    EmulatedResponse
//!                    (JSON / stream, HTTP 심이 변환)
//! ```
#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod names;
pub mod responder;
pub mod response;
pub mod store;
pub mod template;

// --- 주요 타입 re-export ---

// 응답기
pub use responder::EmulationResponder;

// 저장소
pub use store::{
    ContainerRecord, ContainerSpec, ContainerState, ExecRecord, ImageRecord, ResourceStore,
};

// 응답
pub use response::{EmulatedResponse, ResponseBody};

// 템플릿
pub use template::{ResourceCounts, SensorIdentity};

// 설정
pub use config::EmulationConfig;

// 에러
pub use error::EmulationError;
