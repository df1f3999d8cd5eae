//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the listener.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Default admitted connections per second for a single source address.
pub const DEFAULT_MAX_CONNECTIONS_PER_SECOND: f64 = 5.0;

/// Default burst capacity for a single source address.
pub const DEFAULT_BURST: u32 = 10;

/// Default time allowed for a client to send its first byte.
pub const DEFAULT_DETECTION_TIMEOUT_MS: u64 = 2_000;

/// Root configuration for the secure listener service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Connection admission settings.
    pub security: SecurityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
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

/// Admission settings handed to the secure listener at construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Per-address rate limit. Defaults apply when absent.
    pub rate_limit: Option<RateLimitConfig>,

    /// Addresses that bypass rate limiting entirely.
    pub whitelist: Vec<IpAddr>,

    /// How long protocol detection waits for the first byte.
    pub detection_timeout_ms: u64,
}

impl SecurityConfig {
    /// The effective rate limit, falling back to defaults.
    pub fn rate_limit(&self) -> RateLimitConfig {
        self.rate_limit.clone().unwrap_or_default()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            whitelist: Vec::new(),
            detection_timeout_ms: DEFAULT_DETECTION_TIMEOUT_MS,
        }
    }
}

/// Token bucket parameters applied to every source address.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained connections per second (bucket refill rate).
    pub max_connections_per_second: f64,

    /// Burst capacity (bucket size).
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_connections_per_second: DEFAULT_MAX_CONNECTIONS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

/// Timeout configuration for the serving loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format for log lines.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
