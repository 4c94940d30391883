//! 라이브 콘솔 컨슈머 — 신규 캡처 요청을 분류해 구조화 라인으로 출력
//!
//! [`ConsoleConsumer`]는 core의 [`Pipeline`] trait을 구현하여
//! `docktrap-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! RequestLog.subscribe() ──broadcast──> 처리 루프 (단일 태스크, 순차 처리)
//!                                           |
//!                                      classify()
//!                                           |
//!                            Ignore 버림 / Unhandled 원문 로그 / 나머지 렌더
//! ```
//!
//! 처리 루프가 broadcast에서 뒤처지면(lag) 마지막으로 처리한 순번을
//! 체크포인트로 [`RequestLog::find_from_seq`]를 호출해 유실 없이 따라잡습니다.
//! 요청 하나의 분류 실패가 이후 스트림을 멈추는 일은 없습니다 —
//! 분류기는 전면적(total)이며, 루프는 레코드 단위로 격리됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use docktrap_core::error::{DocktrapError, PipelineError};
use docktrap_core::metrics as m;
use docktrap_core::pipeline::{HealthStatus, Pipeline};
use docktrap_core::types::{CapturedRequest, Severity};

use crate::classifier::{ClassifiedEvent, classify};
use crate::error::AnalyzerError;

/// 컨슈머 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsumerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 라이브 콘솔 컨슈머
///
/// # 사용 예시
/// ```ignore
/// let (mut consumer) = ConsoleConsumerBuilder::new()
///     .request_log(log)
///     .build()?;
/// consumer.start().await?;
/// ```
pub struct ConsoleConsumer {
    /// 현재 상태
    state: ConsumerState,
    /// 캡처 로그 (change feed 소스)
    log: Arc<dyn docktrap_core::capture::RequestLog>,
    /// 백그라운드 태스크 핸들
    tasks: Vec<tokio::task::JoinHandle<()>>,
    /// 렌더된 이벤트 수
    events_rendered: Arc<AtomicU64>,
    /// 버려진 노이즈 수
    ignored: Arc<AtomicU64>,
    /// 미분류 요청 수
    unhandled: Arc<AtomicU64>,
}

impl ConsoleConsumer {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            ConsumerState::Initialized => "initialized",
            ConsumerState::Running => "running",
            ConsumerState::Stopped => "stopped",
        }
    }

    /// 렌더된 이벤트 수를 반환합니다.
    pub fn events_rendered(&self) -> u64 {
        self.events_rendered.load(Ordering::Relaxed)
    }

    /// 버려진 노이즈 수를 반환합니다.
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    /// 미분류 요청 수를 반환합니다.
    pub fn unhandled(&self) -> u64 {
        self.unhandled.load(Ordering::Relaxed)
    }
}

impl Pipeline for ConsoleConsumer {
    async fn start(&mut self) -> Result<(), DocktrapError> {
        if self.state == ConsumerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting console consumer");

        let log = Arc::clone(&self.log);
        let mut feed = log.subscribe();
        let events_rendered = Arc::clone(&self.events_rendered);
        let ignored = Arc::clone(&self.ignored);
        let unhandled = Arc::clone(&self.unhandled);

        let task = tokio::spawn(async move {
            // 시작 전에 이미 쌓여 있던 기록은 라이브 구독 대상이 아닙니다.
            let mut last_seq = log.latest_seq();
            loop {
                match feed.recv().await {
                    Ok(request) => {
                        // 체크포인트 재동기화 직후 broadcast 잔여분과 겹칠 수 있습니다.
                        if request.seq <= last_seq {
                            continue;
                        }
                        last_seq = request.seq;
                        render(&request, &events_rendered, &ignored, &unhandled);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, last_seq, "console consumer lagged, resyncing");
                        match log.find_from_seq(last_seq) {
                            Ok(replay) => {
                                for request in replay {
                                    last_seq = request.seq;
                                    render(&request, &events_rendered, &ignored, &unhandled);
                                }
                            }
                            Err(err) => {
                                // 이번 회차는 놓치지만 스트림은 계속 갑니다.
                                warn!(error = %err, "checkpoint resync failed");
                            }
                        }
                    }
                    Err(RecvError::Closed) => {
                        info!("capture feed closed, stopping console consumer");
                        break;
                    }
                }
            }
        });

        self.tasks.push(task);
        self.state = ConsumerState::Running;
        info!("console consumer started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DocktrapError> {
        if self.state != ConsumerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping console consumer");
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        self.state = ConsumerState::Stopped;
        info!("console consumer stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ConsumerState::Running => HealthStatus::Healthy,
            ConsumerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ConsumerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 요청 하나를 분류해 출력합니다. 실패 경로가 없습니다.
fn render(
    request: &CapturedRequest,
    events_rendered: &AtomicU64,
    ignored: &AtomicU64,
    unhandled: &AtomicU64,
) {
    let event = classify(request);
    metrics::counter!(m::ANALYZER_EVENTS_TOTAL, m::LABEL_SEVERITY => event.severity.to_string())
        .increment(1);

    match event.severity {
        Severity::Ignore => {
            ignored.fetch_add(1, Ordering::Relaxed);
            debug!(path = %event.path, "noise request dropped");
        }
        Severity::Unhandled => {
            unhandled.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::ANALYZER_UNHANDLED_TOTAL).increment(1);
            // 규칙 작성을 위해 원문 전체를 남깁니다.
            warn!(
                source_ip = %request.source_ip,
                method = %request.method,
                path = %request.path,
                request = ?request,
                "unhandled request"
            );
        }
        Severity::Enumeration | Severity::Exploitation => {
            events_rendered.fetch_add(1, Ordering::Relaxed);
            emit_event_line(&event);
        }
    }
}

/// 심각도/액션/출처와 비어 있지 않은 추출 필드를 한 줄로 출력합니다.
fn emit_event_line(event: &ClassifiedEvent) {
    if event.extracted.is_empty() {
        info!(
            target: "docktrap::event",
            source_ip = %event.source_ip,
            severity = %event.severity,
            action = %event.action,
            path = %event.path,
            "security event"
        );
    } else {
        info!(
            target: "docktrap::event",
            source_ip = %event.source_ip,
            severity = %event.severity,
            action = %event.action,
            path = %event.path,
            extracted = %event.extracted,
            "security event"
        );
    }
}

/// 콘솔 컨슈머 빌더
pub struct ConsoleConsumerBuilder {
    log: Option<Arc<dyn docktrap_core::capture::RequestLog>>,
}

impl ConsoleConsumerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self { log: None }
    }

    /// 구독할 캡처 로그를 설정합니다.
    pub fn request_log(mut self, log: Arc<dyn docktrap_core::capture::RequestLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// 컨슈머를 빌드합니다.
    pub fn build(self) -> Result<ConsoleConsumer, AnalyzerError> {
        let log = self.log.ok_or_else(|| AnalyzerError::Config {
            field: "request_log".to_owned(),
            reason: "request log must be provided".to_owned(),
        })?;
        Ok(ConsoleConsumer {
            state: ConsumerState::Initialized,
            log,
            tasks: Vec::new(),
            events_rendered: Arc::new(AtomicU64::new(0)),
            ignored: Arc::new(AtomicU64::new(0)),
            unhandled: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl Default for ConsoleConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docktrap_core::capture::{MemoryRequestLog, RequestLog};
    use std::time::{Duration, SystemTime};

    fn sample_request(method: &str, path: &str) -> CapturedRequest {
        CapturedRequest {
            seq: 0,
            timestamp: SystemTime::now(),
            sensor_id: "sensor-01".to_owned(),
            sensor_type: "Docker".to_owned(),
            method: method.to_owned(),
            path: path.to_owned(),
            host: "honeypot".to_owned(),
            args: vec![],
            url: format!("http://honeypot:2375{path}"),
            headers: vec![],
            body_json: None,
            body: Bytes::new(),
            source_ip: "203.0.113.50".parse().unwrap(),
        }
    }

    fn consumer_over(log: Arc<MemoryRequestLog>) -> ConsoleConsumer {
        ConsoleConsumerBuilder::new()
            .request_log(log)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_request_log() {
        let result = ConsoleConsumerBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_creates_initialized_consumer() {
        let consumer = consumer_over(Arc::new(MemoryRequestLog::new()));
        assert_eq!(consumer.state_name(), "initialized");
        assert_eq!(consumer.events_rendered(), 0);
    }

    #[tokio::test]
    async fn lifecycle_start_stop() {
        let mut consumer = consumer_over(Arc::new(MemoryRequestLog::new()));

        assert!(consumer.health_check().await.is_unhealthy());

        consumer.start().await.unwrap();
        assert_eq!(consumer.state_name(), "running");
        assert!(consumer.health_check().await.is_healthy());

        // Double start fails
        assert!(consumer.start().await.is_err());

        consumer.stop().await.unwrap();
        assert_eq!(consumer.state_name(), "stopped");

        // Double stop fails
        assert!(consumer.stop().await.is_err());
    }

    #[tokio::test]
    async fn renders_security_events_and_drops_noise() {
        let log = Arc::new(MemoryRequestLog::new());
        let mut consumer = consumer_over(Arc::clone(&log));
        consumer.start().await.unwrap();

        log.append(sample_request("GET", "/v1.41/_ping")).unwrap(); // enumeration
        log.append(sample_request("POST", "/v1.41/containers/abc/start"))
            .unwrap(); // noise
        log.append(sample_request("GET", "/totally/unknown")).unwrap(); // unhandled

        // 단일 태스크가 순차 처리할 시간을 줍니다.
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(consumer.events_rendered(), 1);
        assert_eq!(consumer.ignored(), 1);
        assert_eq!(consumer.unhandled(), 1);

        consumer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn processes_in_append_order() {
        let log = Arc::new(MemoryRequestLog::new());
        let mut consumer = consumer_over(Arc::clone(&log));
        consumer.start().await.unwrap();

        for i in 0..20 {
            log.append(sample_request("GET", &format!("/v1.41/containers/json?n={i}")))
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(consumer.events_rendered(), 20);

        consumer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn requests_before_start_are_not_replayed() {
        let log = Arc::new(MemoryRequestLog::new());
        log.append(sample_request("GET", "/v1.41/_ping")).unwrap();

        let mut consumer = consumer_over(Arc::clone(&log));
        consumer.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(consumer.events_rendered(), 0);
        consumer.stop().await.unwrap();
    }
}
