//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Validate CORS header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(tls) = &config.listener.tls {
        check_address(&mut errors, "listener.tls.bind_address", &tls.bind_address);
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::Empty("listener.tls.cert_path"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::Empty("listener.tls.key_path"));
        }
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positive = [
        ("listener.max_concurrent_requests", config.listener.max_concurrent_requests as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.body_secs", config.timeouts.body_secs),
        ("limits.max_request_body_bytes", config.limits.max_request_body_bytes as u64),
        ("limits.max_stylesheet_bytes", config.limits.max_stylesheet_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    check_headers(&mut errors, "cors.allowed_headers", &config.cors.allowed_headers);
    check_headers(&mut errors, "cors.exposed_headers", &config.cors.exposed_headers);
    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError::Empty("cors.allowed_origins"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_headers(errors: &mut Vec<ValidationError>, field: &'static str, names: &[String]) {
    for name in names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeader {
                field,
                value: name.clone(),
            });
        }
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
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.body_secs = 0;
        config.cors.allowed_headers.push("Bad Header".into());
        config.listener.tls = Some(TlsConfig {
            bind_address: "0.0.0.0:3443".into(),
            cert_path: "".into(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("timeouts.body_secs")));
        assert!(errors.contains(&ValidationError::Empty("listener.tls.cert_path")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidHeader { .. })));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
