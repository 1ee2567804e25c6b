//! Request orchestration.
//!
//! Per request:
//! ```text
//! classify path
//!   ├─ OtherTraffic   → passthrough to validator
//!   └─ StorageTraffic → start gateway call (speculative, own task)
//!                       → validation required? no → relay gateway response
//!                       → decision query → AllowFree    → relay gateway response
//!                                        → Deny*        → 401/402/403, gateway call aborted
//!                                        → Limit        → arm usage report, correct headers, meter body
//!                                        → Unrecognized → 500, gateway call aborted
//! ```

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::Response;
use hyper::body::Incoming;
use tokio::task::JoinHandle;

use crate::http::forward::{build_forwarded_request, ForwardError, Forwarder};
use crate::http::request::request_id;
use crate::http::response;
use crate::http::server::AppState;
use crate::metering::{correct_headers, effective_cap, QuotaStream};
use crate::observability::metrics;
use crate::routing::{classify, TrafficClass};
use crate::validator::{Grant, PendingReport, ValidationDecision};

/// Which storage requests are sent to the validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    pub disabled: bool,
}

impl ValidationPolicy {
    /// Only reads are gated; mutating requests go straight to the gateway.
    pub fn requires_validation(&self, method: &Method) -> bool {
        !self.disabled && method == Method::GET
    }
}

/// A gateway call started before the decision is known.
///
/// Dropping it aborts the task, which closes the upstream connection if the
/// response is never used.
struct SpeculativeCall(JoinHandle<Result<hyper::Response<Incoming>, ForwardError>>);

impl SpeculativeCall {
    fn start(forwarder: Forwarder, request: Request<Body>) -> Self {
        Self(tokio::spawn(async move { forwarder.send(request).await }))
    }

    async fn join(mut self) -> Result<hyper::Response<Incoming>, ForwardError> {
        (&mut self.0).await?
    }
}

impl Drop for SpeculativeCall {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Entry point for every inbound request.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let traffic = classify(request.uri().path());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        traffic = traffic.as_str(),
        "Proxying request"
    );

    let response = match traffic {
        TrafficClass::OtherTraffic => passthrough(&state, request, &request_id).await,
        TrafficClass::StorageTraffic => authorize(&state, request, &request_id).await,
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), traffic.as_str(), start_time);
    response
}

async fn passthrough(state: &AppState, request: Request<Body>, request_id: &str) -> Response {
    match state.validator.passthrough(request).await {
        Ok(upstream) => response::from_upstream(upstream),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Validator passthrough failed");
            metrics::record_upstream_error("validator");
            response::bad_gateway()
        }
    }
}

async fn authorize(state: &AppState, request: Request<Body>, request_id: &str) -> Response {
    let (parts, body) = request.into_parts();

    let gateway_request = match build_forwarded_request(&parts, body, &state.gateway, false) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build gateway request");
            return response::internal_error();
        }
    };
    let gateway = SpeculativeCall::start(state.forwarder.clone(), gateway_request);

    if !state.policy.requires_validation(&parts.method) {
        tracing::debug!(request_id = %request_id, method = %parts.method, "Validation skipped");
        metrics::record_decision("skipped");
        return relay(gateway, request_id).await;
    }

    let decision = match state.validator.decide(&parts).await {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Decision query failed");
            metrics::record_upstream_error("validator");
            return response::internal_error();
        }
    };

    metrics::record_decision(decision.label());
    tracing::debug!(request_id = %request_id, decision = decision.label(), "Validator decision");

    match decision {
        ValidationDecision::AllowFree => relay(gateway, request_id).await,
        ValidationDecision::DenyForbidden => response::forbidden(),
        ValidationDecision::DenyPaymentRequired => response::payment_required(),
        ValidationDecision::DenyUnauthenticated => response::unauthorized(),
        ValidationDecision::Limit(grant) => {
            // Owed from here on, even if the gateway or the client goes away.
            let pending = state.usage.arm(&grant);
            match gateway.join().await {
                Ok(upstream) => meter(state, upstream, &grant, pending, request_id),
                Err(e) => gateway_failure(e, request_id),
            }
        }
        ValidationDecision::Unrecognized(reason) => {
            tracing::error!(request_id = %request_id, reason = %reason, "Unrecognized validator decision");
            response::internal_error()
        }
    }
}

async fn relay(gateway: SpeculativeCall, request_id: &str) -> Response {
    match gateway.join().await {
        Ok(upstream) => response::from_upstream(upstream),
        Err(e) => gateway_failure(e, request_id),
    }
}

fn gateway_failure(error: ForwardError, request_id: &str) -> Response {
    tracing::error!(request_id = %request_id, error = %error, "Gateway request failed");
    metrics::record_upstream_error("gateway");
    response::internal_error()
}

/// Wrap a gateway response in quota enforcement; the stream settles `pending`.
fn meter(
    state: &AppState,
    upstream: hyper::Response<Incoming>,
    grant: &Grant,
    pending: PendingReport,
    request_id: &str,
) -> Response {
    let cap = effective_cap(grant.max_body_size, state.hard_cap);

    if !upstream.status().is_success() {
        tracing::debug!(
            request_id = %request_id,
            status = %upstream.status(),
            "Gateway response not successful, relaying unmetered"
        );
        pending.settle(0);
        return response::from_upstream(upstream);
    }

    let mut response = response::from_upstream(upstream);
    let status = correct_headers(response.headers_mut(), cap);
    *response.status_mut() = status;

    let (parts, body) = response.into_parts();
    let request_id = request_id.to_string();
    let id = grant.request_id.clone();
    let metered = QuotaStream::new(body.into_data_stream(), cap).on_finish(move |body_size| {
        tracing::info!(
            request_id = %request_id,
            id = %id,
            body_size,
            cap,
            "Metered response finished"
        );
        metrics::record_metered_bytes(body_size);
        pending.settle(body_size);
    });

    Response::from_parts(parts, Body::from_stream(metered))
}
