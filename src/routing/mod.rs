//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → classifier.rs (storage allow-list lookup)
//!     → Return: StorageTraffic (metered flow) or OtherTraffic (validator passthrough)
//! ```
//!
//! # Design Decisions
//! - Allow-list is fixed at compile time
//! - No regex in hot path (segment prefix matching only)
//! - Total: unmatched paths fall back to OtherTraffic

pub mod classifier;

pub use classifier::{classify, TrafficClass, STORAGE_PREFIXES};
