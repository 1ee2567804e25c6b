//! Validator protocol types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::forward::ForwardError;

/// Quota granted by a `Limit` decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub request_id: String,
    pub secret: String,
    pub max_body_size: u64,
}

/// Outcome of a decision query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationDecision {
    AllowFree,
    DenyForbidden,
    DenyPaymentRequired,
    DenyUnauthenticated,
    Limit(Grant),
    /// Any payload or status the proxy cannot act on. Always fatal.
    Unrecognized(String),
}

/// Wire shape of the validator's decision body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionPayload {
    result: String,
    id: Option<String>,
    secret: Option<String>,
    max_body_size: Option<u64>,
}

impl ValidationDecision {
    /// Interpret a decision body. Never fails: anything unexpected becomes
    /// [`ValidationDecision::Unrecognized`].
    pub fn from_json(body: &[u8]) -> Self {
        let payload: DecisionPayload = match serde_json::from_slice(body) {
            Ok(p) => p,
            Err(e) => return Self::Unrecognized(format!("unparsable decision body: {e}")),
        };

        match payload.result.as_str() {
            "AllowFree" => Self::AllowFree,
            "DenyForbidden" => Self::DenyForbidden,
            "DenyPaymentRequired" => Self::DenyPaymentRequired,
            "DenyUnauthenticated" => Self::DenyUnauthenticated,
            "Limit" => match (payload.id, payload.secret, payload.max_body_size) {
                (Some(request_id), Some(secret), Some(max_body_size)) => Self::Limit(Grant {
                    request_id,
                    secret,
                    max_body_size,
                }),
                _ => Self::Unrecognized("Limit decision missing id, secret or maxBodySize".into()),
            },
            other => Self::Unrecognized(format!("unknown decision result '{other}'")),
        }
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllowFree => "allow_free",
            Self::DenyForbidden => "deny_forbidden",
            Self::DenyPaymentRequired => "deny_payment_required",
            Self::DenyUnauthenticated => "deny_unauthenticated",
            Self::Limit(_) => "limit",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Final usage of a metered request, sent to the validator once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub id: String,
    pub body_size: u64,
    pub secret: String,
}

impl UsageReport {
    pub fn new(grant: &Grant, body_size: u64) -> Self {
        Self {
            id: grant.request_id.clone(),
            body_size,
            secret: grant.secret.clone(),
        }
    }
}

/// Errors talking to the validator.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("failed to read decision body: {0}")]
    Body(#[source] axum::Error),

    #[error("usage report failed: {0}")]
    Report(#[from] reqwest::Error),
}

/// Result type for validator operations.
pub type ValidatorResult<T> = Result<T, ValidatorError>;
