//! Metering reverse proxy for a content-addressed storage gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                    METERING PROXY                        │
//!   Client        │  ┌────────┐   ┌───────────┐   storage?   ┌────────────┐  │
//!   ──────────────┼─▶│  http  │──▶│  routing  │──── yes ────▶│  handler   │──┼──▶ Gateway
//!                 │  │ server │   │ classifier│              │ (speculative  │
//!                 │  └────────┘   └─────┬─────┘              │  gateway call)│
//!                 │                     │ no                 └─────┬──────┘  │
//!                 │                     ▼                          │         │
//!                 │              passthrough ──────────────────────┼─────────┼──▶ Validator
//!                 │                                     decision ◀─┘         │
//!                 │                                        │                 │
//!                 │                 Limit ──▶ metering (headers + quota) ────┼──▶ Client
//!                 │                                        │                 │
//!                 │                                 usage report ────────────┼──▶ Validator
//!                 └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod metering;
pub mod net;
pub mod observability;
pub mod routing;
pub mod validator;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
