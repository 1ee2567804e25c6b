//! Client-facing responses.
//!
//! # Responsibilities
//! - Convert upstream responses into streamed client responses
//! - Synthesize denial and error responses
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers from upstream are not relayed
//! - Error bodies are fixed strings; internal details stay in the logs

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;

use crate::http::forward::strip_hop_by_hop;

/// Relay an upstream response, streaming its body.
pub fn from_upstream(response: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

pub fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

pub fn payment_required() -> Response {
    (StatusCode::PAYMENT_REQUIRED, "Payment Required").into_response()
}

pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}
