//! Upstream request construction and dispatch.
//!
//! # Responsibilities
//! - Derive sanitized upstream requests from an inbound request
//! - Send them over a shared pooled client with a bounded wait
//!
//! # Design Decisions
//! - Building and sending are separate steps so the orchestrator can start
//!   the gateway call before it knows the validator's decision
//! - Browser cookies never reach the gateway or the decision query
//! - GET/HEAD bodies are never forwarded
//! - Hop-by-hop headers are connection-scoped and never cross the proxy

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{
    header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri,
};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// Header carrying the upstream authority on validator-bound requests.
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers scoped to a single connection (RFC 9110 §7.6.1).
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Errors raised while forwarding to an upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream URL '{0}'")]
    InvalidUpstream(String),

    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0} seconds")]
    Timeout(u64),

    #[error("upstream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A parsed upstream base URL.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    host: HeaderValue,
}

impl Upstream {
    /// Parse a base URL such as `http://127.0.0.1:1633` or `http://validator/prefix`.
    pub fn parse(url: &str) -> Result<Self, ForwardError> {
        let invalid = || ForwardError::InvalidUpstream(url.to_string());

        let uri: Uri = url.parse().map_err(|_| invalid())?;
        let scheme = uri.scheme().cloned().ok_or_else(invalid)?;
        let authority = uri.authority().cloned().ok_or_else(invalid)?;

        // Bare authority: no scheme, no userinfo.
        let bare = match authority.port_u16() {
            Some(port) => format!("{}:{}", authority.host(), port),
            None => authority.host().to_string(),
        };
        let host = HeaderValue::from_str(&bare).map_err(|_| invalid())?;

        Ok(Self {
            scheme,
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            host,
        })
    }

    /// The `host[:port]` this upstream is addressed by.
    pub fn host(&self) -> &HeaderValue {
        &self.host
    }

    /// Absolute URI for a path (and query) relative to the upstream base.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, ForwardError> {
        let path_and_query = if path_and_query.starts_with('/') {
            format!("{}{}", self.base_path, path_and_query)
        } else {
            format!("{}/{}", self.base_path, path_and_query)
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }
}

/// Whether a method's body is dropped on the way upstream.
pub fn omits_body(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Build the request sent to `upstream` on behalf of an inbound request.
///
/// `Host` is rewritten to the upstream authority and `Cookie` removed. With
/// `add_forwarded_host`, `X-Forwarded-Host` carries the same authority.
pub fn build_forwarded_request(
    parts: &Parts,
    body: Body,
    upstream: &Upstream,
    add_forwarded_host: bool,
) -> Result<Request<Body>, ForwardError> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = upstream.uri_for(path_and_query)?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::COOKIE);
    headers.insert(header::HOST, upstream.host().clone());
    if add_forwarded_host {
        headers.insert(X_FORWARDED_HOST, upstream.host().clone());
    }

    let body = if omits_body(&parts.method) {
        headers.remove(header::CONTENT_LENGTH);
        Body::empty()
    } else {
        body
    };

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(body)?;
    *request.headers_mut() = headers;

    Ok(request)
}

/// Build a transparent passthrough request: like [`build_forwarded_request`]
/// with `X-Forwarded-Host`, but the inbound cookies are kept.
pub fn build_passthrough_request(
    parts: &Parts,
    body: Body,
    upstream: &Upstream,
) -> Result<Request<Body>, ForwardError> {
    let mut request = build_forwarded_request(parts, body, upstream, true)?;
    for cookie in parts.headers.get_all(header::COOKIE) {
        request.headers_mut().append(header::COOKIE, cookie.clone());
    }
    Ok(request)
}

/// Shared upstream HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Forwarder {
    /// Create a pooled client. `timeout` bounds the wait for response headers.
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, timeout }
    }

    /// Upper bound on each wait for an upstream.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request built by this module.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, ForwardError> {
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ForwardError::Timeout(self.timeout.as_secs())),
        }
    }
}
