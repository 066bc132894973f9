//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control plane.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Route store settings.
    pub database: DatabaseConfig,

    /// Gateway push-channel settings.
    pub gateway: GatewayConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Operator authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
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

/// Route store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g., "sqlite://control-plane.db" or "sqlite::memory:").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long a writer waits on a locked database before failing, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://control-plane.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Gateway push-channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upper bound for delivering one message to one gateway, in milliseconds.
    pub send_timeout_ms: u64,

    /// Per-channel outbound queue capacity.
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 2_000,
            queue_capacity: 64,
        }
    }
}

/// Timeout configuration for operator requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Operator authentication configuration.
///
/// Session issuance lives outside the control plane; here each operator token simply
/// maps to the owner id its routes are stored under.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub operators: Vec<OperatorCredential>,
}

/// A bearer token accepted on the mutation API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperatorCredential {
    /// Bearer token value.
    pub token: String,

    /// Owner id the token acts as.
    pub owner_id: i64,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}
