//! Validator integration subsystem.
//!
//! # Data Flow
//! ```text
//! storage request (GET)
//!     → client.rs (decision query: same request shape + X-Forwarded-Host)
//!     → types.rs (JSON → ValidationDecision)
//!     → orchestrator picks: passthrough / deny / metered
//!
//! metered stream finished
//!     → usage.rs (PUT {id, bodySize, secret} to the close endpoint)
//! ```
//!
//! # Design Decisions
//! - Decision logic lives in the validator; the proxy only interprets it
//! - Unknown or malformed decisions are fatal for the request (500)
//! - Usage reports are fire-and-forget

pub mod client;
pub mod types;
pub mod usage;

pub use client::ValidatorClient;
pub use types::{Grant, UsageReport, ValidationDecision, ValidatorError, ValidatorResult};
pub use usage::{PendingReport, UsageReporter};
