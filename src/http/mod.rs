//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware: trace, request ID, timeout)
//!     → handler.rs (classify path, orchestrate gateway + validator legs)
//!     → forward.rs (sanitized upstream requests, pooled client)
//!     → response.rs (relay or synthesize)
//!     → Send to client
//! ```

pub mod forward;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{build_forwarded_request, ForwardError, Forwarder, Upstream, X_FORWARDED_HOST};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
