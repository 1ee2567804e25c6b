//! Shared utilities for integration testing: a raw TCP mock gateway, an
//! axum mock validator and a proxy bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use metering_proxy::config::ProxyConfig;
use metering_proxy::{HttpServer, Shutdown};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const CLOSE_PATH: &str = "/api/v0.2/interceptor/request/close";

/// Canned response served by the mock gateway.
#[derive(Clone)]
pub struct GatewayResponse {
    pub status: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: "200 OK",
            headers: Vec::new(),
            body,
        }
    }
}

/// A request as seen by the mock gateway.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

pub type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Start a mock gateway answering every connection with `response`.
pub async fn start_mock_gateway(response: GatewayResponse) -> (SocketAddr, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded: Recorded = Arc::default();
    let log = recorded.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let response = response.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(request);

                        let mut head = format!("HTTP/1.1 {}\r\n", response.status);
                        for (name, value) in &response.headers {
                            head.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        head.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n",
                            response.body.len()
                        ));

                        // The proxy may hang up early once a quota is reached.
                        if socket.write_all(head.as_bytes()).await.is_ok() {
                            let _ = socket.write_all(&response.body).await;
                        }
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut request = RecordedRequest {
        head,
        body: Vec::new(),
    };
    let content_length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    request.body = buf[head_end..].to_vec();
    Some(request)
}

/// A request as seen by the mock validator.
#[derive(Clone, Debug)]
pub struct ValidatorQuery {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

#[derive(Clone, Default)]
pub struct ValidatorLog {
    pub queries: Arc<Mutex<Vec<ValidatorQuery>>>,
    pub reports: Arc<Mutex<Vec<Value>>>,
}

#[derive(Clone)]
struct MockValidatorState {
    log: ValidatorLog,
    status: StatusCode,
    decision: Value,
}

/// Start a mock validator answering every query with `decision` and
/// recording usage reports.
pub async fn start_mock_validator(status: StatusCode, decision: Value) -> (SocketAddr, ValidatorLog) {
    let log = ValidatorLog::default();
    let state = MockValidatorState {
        log: log.clone(),
        status,
        decision,
    };

    let app = Router::new()
        .route(CLOSE_PATH, put(record_report))
        .fallback(decide)
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, log)
}

async fn decide(State(state): State<MockValidatorState>, request: Request<axum::body::Body>) -> Response {
    state.log.queries.lock().unwrap().push(ValidatorQuery {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        headers: request.headers().clone(),
    });
    (state.status, Json(state.decision.clone())).into_response()
}

async fn record_report(State(state): State<MockValidatorState>, Json(report): Json<Value>) -> StatusCode {
    state.log.reports.lock().unwrap().push(report);
    StatusCode::OK
}

/// Proxy configuration pointing at the given mocks.
pub fn proxy_config(gateway: SocketAddr, validator: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstreams.gateway_url = format!("http://{}", gateway);
    config.upstreams.validator_url = format!("http://{}", validator);
    config.timeouts.upstream_secs = 5;
    config.timeouts.report_secs = 2;
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait until at least `count` usage reports have arrived.
pub async fn wait_for_reports(log: &ValidatorLog, count: usize) -> Vec<Value> {
    for _ in 0..150 {
        {
            let reports = log.reports.lock().unwrap();
            if reports.len() >= count {
                return reports.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    log.reports.lock().unwrap().clone()
}

/// Deterministic, non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
