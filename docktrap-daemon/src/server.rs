//! HTTP shim between the wire and the framework-agnostic responder.
//!
//! One catch-all fallback handler does the whole job: build a
//! [`CapturedRequest`] from the inbound request, append it to the capture
//! log, hand it to the [`EmulationResponder`], and convert the resulting
//! [`EmulatedResponse`] back to an HTTP response. URL dispatch itself lives
//! in the responder — the framework layer stays a thin I/O adapter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use docktrap_core::capture::RequestLog;
use docktrap_core::metrics as m;
use docktrap_core::types::CapturedRequest;
use docktrap_emulation::{EmulatedResponse, EmulationResponder, ResponseBody};

/// Upper bound on captured request bodies. Build contexts are the largest
/// legitimate payloads; anything bigger is truncated to nothing.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Shared state for the catch-all handler.
#[derive(Clone)]
pub struct SensorState {
    /// The emulation surface.
    pub responder: Arc<EmulationResponder>,
    /// Append-only capture log.
    pub log: Arc<dyn RequestLog>,
    /// Sensor id stamped onto every captured request.
    pub sensor_id: String,
}

/// Builds the sensor router: a single fallback route captures everything.
pub fn router(state: SensorState) -> Router {
    Router::new().fallback(handle_any).with_state(state)
}

/// Serves the sensor until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: SensorState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}

async fn handle_any(
    State(state): State<SensorState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let captured = match capture(&state, peer, request).await {
        Ok(captured) => captured,
        Err(response) => return response,
    };

    let emulated = state.responder.handle(&captured).await;
    into_http(emulated)
}

/// Builds and persists the [`CapturedRequest`]. On storage failure the
/// request is answered with a bare 500 — the process must keep serving.
async fn capture(
    state: &SensorState,
    peer: SocketAddr,
    request: Request,
) -> Result<CapturedRequest, Response> {
    let (parts, body) = request.into_parts();

    let method = parts.method.to_string();
    let path = parts.uri.path().to_owned();
    let query = parts.uri.query().unwrap_or("");
    let args: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let raw_host = parts
        .headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let host = raw_host.split(':').next().unwrap_or("").to_owned();
    let url = format!("http://{raw_host}{}", parts.uri);

    let body_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, source_ip = %peer.ip(), "failed to read request body");
            Bytes::new()
        }
    };
    let body_json = if body_bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&body_bytes).ok()
    };

    let mut captured = CapturedRequest {
        seq: 0,
        timestamp: SystemTime::now(),
        sensor_id: state.sensor_id.clone(),
        sensor_type: "Docker".to_owned(),
        method,
        path,
        host,
        args,
        url,
        headers,
        body_json,
        body: body_bytes,
        source_ip: peer.ip(),
    };

    metrics::counter!(m::SENSOR_REQUESTS_CAPTURED_TOTAL).increment(1);
    debug!(%captured, "request captured");

    match state.log.append(captured.clone()) {
        Ok(seq) => {
            captured.seq = seq;
            Ok(captured)
        }
        Err(err) => {
            error!(error = %err, "failed to persist captured request");
            Err(bare_status(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

/// Converts the framework-agnostic response into an HTTP response.
fn into_http(resp: EmulatedResponse) -> Response {
    let default_content_type = if resp.has_header("Content-Type") {
        None
    } else {
        resp.default_content_type()
    };
    let EmulatedResponse {
        status,
        headers,
        body,
    } = resp;

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    if let Some(content_type) = default_content_type {
        builder = builder.header("Content-Type", content_type);
    }

    let body = match body {
        ResponseBody::Empty => Body::empty(),
        ResponseBody::Text(text) => Body::from(text),
        ResponseBody::Json(value) => Body::from(value.to_string()),
        ResponseBody::Stream(rx) => {
            Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>))
        }
    };

    match builder.body(body) {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to assemble http response");
            bare_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn bare_status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
