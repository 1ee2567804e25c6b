//! Quota enforcement subsystem.
//!
//! # Data Flow
//! ```text
//! Limit decision + 2xx gateway response
//!     → headers.rs (Content-Range / Content-Length correction, status 200/206)
//!     → quota.rs (byte-counting filter truncating at the effective cap)
//!     → client
//!     → on stream end or drop: final byte count → validator usage report
//! ```
//!
//! # Design Decisions
//! - effective cap = min(granted quota, hard cap)
//! - Headers are corrected before any body byte is sent
//! - The filter is HTTP-agnostic and testable on plain byte streams

pub mod headers;
pub mod quota;

pub use headers::{correct_headers, truncate_content_range};
pub use quota::QuotaStream;

/// Cap applied to a single metered response.
pub fn effective_cap(granted: u64, hard_cap: u64) -> u64 {
    granted.min(hard_cap)
}
