//! IOC 일괄 내보내기 — 시간 윈도우의 캡처 기록에서 지표를 수집해 싱크로 전송
//!
//! [`IocExporter`]는 캡처 로그를 다시 읽어 분류하고, 공격 등급 요청의
//! 출발지 IP, 추출된 URL, 해시 토큰을 [`IndicatorSink`]로 내보냅니다.
//! 같은 `(유형, 값)` 쌍은 한 번만 내보냅니다 — 싱크를 범람시키지 않기
//! 위한 계약입니다.
//!
//! 구체적인 위협 인텔리전스 클라이언트는 범위 밖입니다. 이 모듈은
//! `create_event`/`add_indicator` 시그니처에만 의존하며,
//! [`TracingIndicatorSink`]가 단일 프로세스용 기본 구현입니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use docktrap_core::capture::RequestLog;
use docktrap_core::metrics as m;
use docktrap_core::types::{Indicator, IndicatorKind};

use crate::classifier::classify;
use crate::error::AnalyzerError;

/// 위협 인텔리전스 싱크 trait
///
/// 이벤트 하나를 만들고 그 아래에 지표를 붙이는 모델입니다.
pub trait IndicatorSink: Send + Sync {
    /// 내보내기 이벤트를 생성하고 핸들을 반환합니다.
    fn create_event(&self, name: &str, tags: &[String]) -> Result<String, AnalyzerError>;

    /// 이벤트에 지표 하나를 추가합니다.
    fn add_indicator(&self, event: &str, indicator: &Indicator) -> Result<(), AnalyzerError>;
}

/// 지표를 구조화 로그로만 내보내는 기본 싱크
pub struct TracingIndicatorSink;

impl IndicatorSink for TracingIndicatorSink {
    fn create_event(&self, name: &str, tags: &[String]) -> Result<String, AnalyzerError> {
        let handle = uuid::Uuid::new_v4().to_string();
        info!(target: "docktrap::export", event = %handle, name, ?tags, "export event created");
        Ok(handle)
    }

    fn add_indicator(&self, event: &str, indicator: &Indicator) -> Result<(), AnalyzerError> {
        info!(
            target: "docktrap::export",
            event,
            kind = %indicator.kind,
            value = %indicator.value,
            comment = %indicator.comment,
            "indicator"
        );
        Ok(())
    }
}

/// 내보내기 실행 결과 요약
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// 조회한 요청 수
    pub requests_scanned: usize,
    /// 내보낸 지표 수 (중복 제거 후)
    pub indicators_exported: usize,
    /// 생성된 이벤트 핸들 (지표가 없으면 None)
    pub event: Option<String>,
}

/// IOC 일괄 내보내기
pub struct IocExporter {
    log: Arc<dyn RequestLog>,
    sink: Arc<dyn IndicatorSink>,
    sensor_id: String,
}

impl IocExporter {
    /// 새 내보내기를 생성합니다.
    pub fn new(
        log: Arc<dyn RequestLog>,
        sink: Arc<dyn IndicatorSink>,
        sensor_id: impl Into<String>,
    ) -> Self {
        Self {
            log,
            sink,
            sensor_id: sensor_id.into(),
        }
    }

    /// `[start, end)` 윈도우의 요청에서 지표를 수집해 내보냅니다.
    pub fn export_range(
        &self,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<ExportSummary, AnalyzerError> {
        let requests = self
            .log
            .find_range(start, end)
            .map_err(|e| AnalyzerError::Log(e.to_string()))?;

        let mut seen: HashSet<(IndicatorKind, String)> = HashSet::new();
        let mut indicators: Vec<Indicator> = Vec::new();
        let mut push = |kind: IndicatorKind, value: String, comment: String| {
            if seen.insert((kind, value.clone())) {
                indicators.push(Indicator {
                    kind,
                    value,
                    comment,
                });
            }
        };

        for request in &requests {
            let event = classify(request);
            if !event.severity.is_exploitation() {
                continue;
            }

            let comment = format!(
                "{} {} from {}",
                request.method, request.path, request.source_ip
            );

            push(
                IndicatorKind::IpSrc,
                request.source_ip.to_string(),
                comment.clone(),
            );

            for url in &event.extracted.urls {
                push(IndicatorKind::Url, url.clone(), comment.clone());
            }

            for text in [
                event.extracted.cmd.as_deref(),
                event.extracted.entrypoint.as_deref(),
                event.extracted.dockerfile.as_deref(),
            ]
            .into_iter()
            .flatten()
            {
                for (kind, hash) in hash_tokens(text) {
                    push(kind, hash, comment.clone());
                }
            }
        }

        if indicators.is_empty() {
            debug!(
                requests = requests.len(),
                "no indicators in window, skipping export"
            );
            return Ok(ExportSummary {
                requests_scanned: requests.len(),
                ..Default::default()
            });
        }

        let date: DateTime<Utc> = Utc::now();
        let event_name = format!("Docker honeypot ({}) {}", self.sensor_id, date.format("%Y-%m-%d"));
        let tags = vec![
            "AutoGenerated".to_owned(),
            "honeypot-basic:interaction-level=\"high\"".to_owned(),
        ];
        let event = self.sink.create_event(&event_name, &tags)?;

        let mut exported = 0usize;
        for indicator in &indicators {
            match self.sink.add_indicator(&event, indicator) {
                Ok(()) => {
                    exported += 1;
                    metrics::counter!(
                        m::EXPORT_INDICATORS_TOTAL,
                        m::LABEL_KIND => indicator.kind.to_string()
                    )
                    .increment(1);
                }
                Err(err) => {
                    // 싱크 단위 실패는 지표 하나만 잃습니다.
                    warn!(error = %err, indicator = %indicator, "failed to export indicator");
                }
            }
        }
        metrics::counter!(m::EXPORT_RUNS_TOTAL).increment(1);

        info!(
            requests = requests.len(),
            indicators = exported,
            event = %event,
            "ioc export completed"
        );

        Ok(ExportSummary {
            requests_scanned: requests.len(),
            indicators_exported: exported,
            event: Some(event),
        })
    }
}

/// 텍스트에서 hex 해시로 보이는 토큰을 길이로 분류해 추출합니다.
///
/// 32/40/64자는 각각 md5/sha1/sha256으로 봅니다. 길이에만 기대는
/// 휴리스틱이라 과잉 매칭이 있을 수 있지만, 64자 컨테이너 ID와 같은
/// 정당한 hex 토큰은 업로드 페이로드에 잘 섞여 나오지 않습니다.
fn hash_tokens(text: &str) -> Vec<(IndicatorKind, String)> {
    text.split(|c: char| !c.is_ascii_hexdigit())
        .filter_map(|token| {
            let kind = match token.len() {
                32 => IndicatorKind::Md5,
                40 => IndicatorKind::Sha1,
                64 => IndicatorKind::Sha256,
                _ => return None,
            };
            Some((kind, token.to_lowercase()))
        })
        .collect()
}
