//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.tls configured?
//!     yes → tls.rs (load PEM cert/key) → axum-server rustls acceptor
//!     no  → plain TCP listener → axum::serve
//! ```

pub mod tls;

pub use tls::load_tls_config;
