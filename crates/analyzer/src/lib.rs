//! Docktrap 분석 크레이트 — 분류/추출/알림/내보내기
//!
//! # 모듈 구성
//!
//! - [`extract`]: URL/Dockerfile 아티팩트 추출 (순수 함수)
//! - [`classifier`]: 순서 있는 규칙 목록 기반 요청 분류
//! - [`console`]: 신규 캡처 요청의 라이브 콘솔 컨슈머 (Pipeline 구현)
//! - [`export`]: 시간 윈도우 기반 IOC 일괄 내보내기
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RequestLog ──subscribe──> ConsoleConsumer ──> classify ──> tracing 라인
//!     |
//!     └──find_range──> IocExporter ──> classify ──> dedup ──> IndicatorSink
//! ```

pub mod classifier;
pub mod console;
pub mod error;
pub mod export;
pub mod extract;

// --- 주요 타입 re-export ---

// 분류기
pub use classifier::{Action, ClassifiedEvent, Extracted, classify};

// 추출기
pub use extract::{extract_dockerfile, extract_urls};

// 콘솔 컨슈머
pub use console::{ConsoleConsumer, ConsoleConsumerBuilder};

// 내보내기
pub use export::{ExportSummary, IndicatorSink, IocExporter, TracingIndicatorSink};

// 에러
pub use error::AnalyzerError;
