//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay values from the process environment onto a loaded config.
///
/// `lookup` is injected so tests do not have to mutate the real environment.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEWAY_URL") {
        config.upstreams.gateway_url = v;
    }
    if let Some(v) = lookup("VALIDATOR_URL") {
        config.upstreams.validator_url = v;
    }
    if let Some(v) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("HARD_CAP_BYTES") {
        config.metering.hard_cap_bytes = v.trim().parse().map_err(|_| ConfigError::Env {
            name: "HARD_CAP_BYTES",
            value: v.clone(),
        })?;
    }
    if let Some(v) = lookup("DISABLE_VALIDATION") {
        config.metering.disable_validation = parse_flag(&v).ok_or(ConfigError::Env {
            name: "DISABLE_VALIDATION",
            value: v.clone(),
        })?;
    }

    match (lookup("TLS_CERT_PATH"), lookup("TLS_KEY_PATH")) {
        (Some(cert_path), Some(key_path)) => {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (Some(cert_path), None) => {
            let key_path = config.listener.tls.as_ref().map(|t| t.key_path.clone()).unwrap_or_default();
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (None, Some(key_path)) => {
            let cert_path = config.listener.tls.as_ref().map(|t| t.cert_path.clone()).unwrap_or_default();
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (None, None) => {}
    }

    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
