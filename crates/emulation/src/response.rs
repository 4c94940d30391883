//! 프레임워크 독립 응답 타입
//!
//! 응답기는 HTTP 프레임워크를 모르고 [`EmulatedResponse`]만 만듭니다.
//! 데몬의 HTTP 심이 이를 실제 프레임워크 응답으로 변환합니다.
//! 스트림 본문은 `mpsc` 수신측으로 표현되며, 전송측은 스폰된 태스크가
//! 잡고 있습니다 — 클라이언트가 중간에 끊으면 그 태스크만 send 실패로
//! 종료되고 저장소 상태에는 영향이 없습니다.

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::EmulationError;

/// 응답 본문
#[derive(Debug)]
pub enum ResponseBody {
    /// 빈 본문
    Empty,
    /// 평문 본문
    Text(String),
    /// JSON 본문
    Json(Value),
    /// 청크 스트림 본문 (풀 진행, 이벤트 시퀀스)
    Stream(mpsc::Receiver<Bytes>),
}

/// 합성된 응답
#[derive(Debug)]
pub struct EmulatedResponse {
    /// HTTP 상태 코드
    pub status: u16,
    /// 추가 헤더 (모방 헤더 포함)
    pub headers: Vec<(String, String)>,
    /// 본문
    pub body: ResponseBody,
}

impl EmulatedResponse {
    /// 빈 본문 응답을 만듭니다.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }

    /// 평문 응답을 만듭니다.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: ResponseBody::Text(body.into()),
        }
    }

    /// JSON 응답을 만듭니다.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: ResponseBody::Json(body),
        }
    }

    /// `{"message": ...}` 형식의 JSON 응답을 만듭니다.
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "message": message.into() }))
    }

    /// 스트림 응답을 만듭니다.
    pub fn stream(status: u16, rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: ResponseBody::Stream(rx),
        }
    }

    /// 에뮬레이션 에러를 Docker 클라이언트가 기대하는 응답으로 변환합니다.
    pub fn from_error(err: &EmulationError) -> Self {
        Self::message(err.http_status(), err.client_message())
    }

    /// 헤더를 추가하고 self를 돌려줍니다.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 이미 설정된 헤더인지 확인합니다 (키 대소문자 무시).
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// 본문 종류에 따른 기본 Content-Type을 반환합니다.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self.body {
            ResponseBody::Empty => None,
            ResponseBody::Text(_) => Some("text/plain; charset=utf-8"),
            ResponseBody::Json(_) | ResponseBody::Stream(_) => Some("application/json"),
        }
    }
}
