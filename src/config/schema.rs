//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// System-wide ceiling on bytes delivered for a single metered response.
pub const DEFAULT_HARD_CAP_BYTES: u64 = 5_000_000;

/// Validator endpoint notified when a metered stream ends.
pub const DEFAULT_USAGE_CLOSE_PATH: &str = "/api/v0.2/interceptor/request/close";

/// Root configuration for the metering proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Storage gateway and validator locations.
    pub upstreams: UpstreamConfig,

    /// Quota and authorization settings.
    pub metering: MeteringConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream service locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the storage gateway (e.g., "http://127.0.0.1:1633").
    pub gateway_url: String,

    /// Base URL of the validator service.
    pub validator_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:1633".to_string(),
            validator_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Metering and authorization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Upper bound applied on top of every validator-granted quota.
    pub hard_cap_bytes: u64,

    /// Skip the validator entirely and forward every storage request.
    pub disable_validation: bool,

    /// Path on the validator receiving usage reports.
    pub usage_close_path: String,

    /// Largest decision body accepted from the validator.
    pub decision_body_limit: usize,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            hard_cap_bytes: DEFAULT_HARD_CAP_BYTES,
            disable_validation: false,
            usage_close_path: DEFAULT_USAGE_CLOSE_PATH.to_string(),
            decision_body_limit: 64 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for an upstream leg to produce response headers.
    pub upstream_secs: u64,

    /// Inbound request timeout (until response headers) in seconds.
    pub request_secs: u64,

    /// Usage report timeout in seconds.
    pub report_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
            report_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.metering.hard_cap_bytes, 5_000_000);
        assert!(!config.metering.disable_validation);
        assert_eq!(
            config.metering.usage_close_path,
            "/api/v0.2/interceptor/request/close"
        );
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstreams]
            gateway_url = "http://bee:1633"

            [metering]
            disable_validation = true

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstreams.gateway_url, "http://bee:1633");
        assert_eq!(config.upstreams.validator_url, "http://127.0.0.1:3000");
        assert!(config.metering.disable_validation);
        assert_eq!(config.metering.hard_cap_bytes, DEFAULT_HARD_CAP_BYTES);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.timeouts.upstream_secs, 30);
    }
}
