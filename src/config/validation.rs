//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, burst >= 1, timeouts > 0)
//! - Check that the bind address and TLS paths are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.tls.{0} must not be empty")]
    EmptyTlsPath(&'static str),

    #[error("security.rate_limit.max_connections_per_second must be positive, got {0}")]
    NonPositiveRate(f64),

    #[error("security.rate_limit.burst must be at least 1")]
    ZeroBurst,

    #[error("security.detection_timeout_ms must be greater than zero")]
    ZeroDetectionTimeout,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("cert_path"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key_path"));
        }
    }

    let limit = config.security.rate_limit();
    // NaN fails this comparison too.
    if !(limit.max_connections_per_second > 0.0) {
        errors.push(ValidationError::NonPositiveRate(limit.max_connections_per_second));
    }
    if limit.burst == 0 {
        errors.push(ValidationError::ZeroBurst);
    }

    if config.security.detection_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDetectionTimeout);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RateLimitConfig, TlsConfig};

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.tls = Some(TlsConfig {
            cert_path: "".into(),
            key_path: "/etc/key.pem".into(),
        });
        config.security.rate_limit = Some(RateLimitConfig {
            max_connections_per_second: 0.0,
            burst: 0,
        });
        config.security.detection_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::EmptyTlsPath("cert_path"),
                ValidationError::NonPositiveRate(0.0),
                ValidationError::ZeroBurst,
                ValidationError::ZeroDetectionTimeout,
            ]
        );
    }
}
