//! Decision queries and passthrough traffic to the validator.
//!
//! # Responsibilities
//! - Forward the shape of a storage request to the validator and read back
//!   its decision
//! - Reverse-proxy non-storage traffic to the validator untouched
//!
//! # Design Decisions
//! - Anything but `200` is an unrecognized decision, never retried
//! - Decision bodies are size-limited and read under the upstream timeout;
//!   everything else streams

use axum::body::Body;
use axum::http::{request::Parts, Request, Response, StatusCode};
use hyper::body::Incoming;

use crate::http::forward::{
    build_forwarded_request, build_passthrough_request, ForwardError, Forwarder, Upstream,
};
use crate::validator::types::{ValidationDecision, ValidatorError, ValidatorResult};

/// Client for the validator's decision endpoint.
#[derive(Clone)]
pub struct ValidatorClient {
    forwarder: Forwarder,
    upstream: Upstream,
    body_limit: usize,
}

impl ValidatorClient {
    pub fn new(forwarder: Forwarder, upstream: Upstream, body_limit: usize) -> Self {
        Self {
            forwarder,
            upstream,
            body_limit,
        }
    }

    /// Ask the validator what to do with a storage request.
    ///
    /// Only reads are validated, so the query never carries a body.
    pub async fn decide(&self, parts: &Parts) -> ValidatorResult<ValidationDecision> {
        let request = build_forwarded_request(parts, Body::empty(), &self.upstream, true)?;
        let response = self.forwarder.send(request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(ValidationDecision::Unrecognized(format!(
                "validator responded with status {status}"
            )));
        }

        let timeout = self.forwarder.timeout();
        let read = axum::body::to_bytes(Body::new(response.into_body()), self.body_limit);
        let body = tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| ForwardError::Timeout(timeout.as_secs()))?
            .map_err(ValidatorError::Body)?;

        Ok(ValidationDecision::from_json(&body))
    }

    /// Reverse-proxy a non-storage request to the validator.
    pub async fn passthrough(&self, request: Request<Body>) -> Result<Response<Incoming>, ForwardError> {
        let (parts, body) = request.into_parts();
        let request = build_passthrough_request(&parts, body, &self.upstream)?;
        self.forwarder.send(request).await
    }
}
