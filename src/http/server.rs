//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, timeout)
//! - Build the upstream clients from configuration
//! - Serve over plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, routing::any, Router};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::forward::{ForwardError, Forwarder, Upstream};
use crate::http::handler::{proxy_handler, ValidationPolicy};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::validator::{UsageReporter, ValidatorClient, ValidatorError};

/// Time given to in-flight TLS connections after shutdown is triggered.
const TLS_DRAIN_SECS: u64 = 10;

/// Errors building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] ForwardError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub gateway: Arc<Upstream>,
    pub validator: Arc<ValidatorClient>,
    pub usage: UsageReporter,
    pub policy: ValidationPolicy,
    pub hard_cap: u64,
}

impl AppState {
    /// Build upstream clients from a validated configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ServerError> {
        let forwarder = Forwarder::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.upstream_secs),
        );
        let gateway = Upstream::parse(&config.upstreams.gateway_url)?;
        let validator_upstream = Upstream::parse(&config.upstreams.validator_url)?;
        let usage = UsageReporter::new(
            &config.upstreams.validator_url,
            &config.metering.usage_close_path,
            Duration::from_secs(config.timeouts.report_secs),
        )?;

        Ok(Self {
            validator: Arc::new(ValidatorClient::new(
                forwarder.clone(),
                validator_upstream,
                config.metering.decision_body_limit,
            )),
            forwarder,
            gateway: Arc::new(gateway),
            usage,
            policy: ValidationPolicy {
                disabled: config.metering.disable_validation,
            },
            hard_cap: config.metering.hard_cap_bytes,
        })
    }
}

/// HTTP server for the metering proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(config)?;
        let router = Self::build_router(config, state);

        tracing::info!(
            gateway = %config.upstreams.gateway_url,
            validator = %config.upstreams.validator_url,
            hard_cap_bytes = config.metering.hard_cap_bytes,
            validation_disabled = config.metering.disable_validation,
            "Proxy initialized"
        );

        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "request",
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
            )
        });

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(trace)
            .layer(set_request_id_layer())
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        tracing::info!(address = %addr, "HTTPS server starting");

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn unreachable_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstreams.gateway_url = "http://127.0.0.1:1".into();
        config.upstreams.validator_url = "http://127.0.0.1:1".into();
        config.timeouts.upstream_secs = 2;
        config
    }

    #[tokio::test]
    async fn test_gateway_failure_is_generic_500_with_request_id() {
        let mut config = unreachable_config();
        config.metering.disable_validation = true;
        let server = HttpServer::new(&config).unwrap();

        let response = server
            .router
            .oneshot(Request::builder().uri("/bzz/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }

    #[tokio::test]
    async fn test_validator_failure_is_500_and_passthrough_failure_is_502() {
        let server = HttpServer::new(&unreachable_config()).unwrap();

        let storage = server
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/bzz/abc")
                    .header(X_REQUEST_ID, "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.headers()[X_REQUEST_ID], "req-7");

        let other = server
            .router
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_upstream_is_rejected() {
        let mut config = ProxyConfig::default();
        config.upstreams.gateway_url = "not a url".into();
        assert!(matches!(HttpServer::new(&config), Err(ServerError::Upstream(_))));
    }
}
