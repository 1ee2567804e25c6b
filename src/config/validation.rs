//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream URLs are usable by the forwarding client
//! - Validate value ranges (timeouts > 0, cap > 0, bind address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("{field}: invalid upstream URL '{value}': {reason}")]
    UpstreamUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("metering.hard_cap_bytes must be greater than zero")]
    ZeroHardCap,

    #[error("metering.usage_close_path must start with '/'")]
    UsageClosePath,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("listener.tls requires both cert_path and key_path")]
    IncompleteTls,
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }

    check_upstream("upstreams.gateway_url", &config.upstreams.gateway_url, &mut errors);
    check_upstream("upstreams.validator_url", &config.upstreams.validator_url, &mut errors);

    if config.metering.hard_cap_bytes == 0 {
        errors.push(ValidationError::ZeroHardCap);
    }
    if !config.metering.usage_close_path.starts_with('/') {
        errors.push(ValidationError::UsageClosePath);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("upstream_secs", config.timeouts.upstream_secs),
        ("request_secs", config.timeouts.request_secs),
        ("report_secs", config.timeouts.report_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    let reason = match Url::parse(value) {
        Ok(url) if url.scheme() != "http" => Some(format!("unsupported scheme '{}'", url.scheme())),
        Ok(url) if url.host_str().is_none() => Some("missing host".to_string()),
        Ok(url) if url.query().is_some() => Some("query strings are not allowed".to_string()),
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    };

    if let Some(reason) = reason {
        errors.push(ValidationError::UpstreamUrl {
            field,
            value: value.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.upstreams.gateway_url = "https://bee:1633".into();
        config.upstreams.validator_url = "validator".into();
        config.metering.hard_cap_bytes = 0;
        config.timeouts.upstream_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroHardCap));
        assert!(errors.contains(&ValidationError::ZeroTimeout("upstream_secs")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UpstreamUrl { field: "upstreams.gateway_url", .. })));
    }

    #[test]
    fn test_incomplete_tls() {
        let mut config = ProxyConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: String::new(),
        });
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::IncompleteTls]
        );
    }
}
