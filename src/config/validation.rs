//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0)
//! - Check addresses parse and operator tokens are unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControlPlaneConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ControlPlaneConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ControlPlaneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if !config.database.url.starts_with("sqlite:") {
        errors.push(ValidationError::new(
            "database.url",
            "only sqlite: URLs are supported",
        ));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be > 0"));
    }

    if config.gateway.send_timeout_ms == 0 {
        errors.push(ValidationError::new("gateway.send_timeout_ms", "must be > 0"));
    }
    if config.gateway.queue_capacity == 0 {
        errors.push(ValidationError::new("gateway.queue_capacity", "must be > 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    let mut tokens = HashSet::new();
    for operator in &config.auth.operators {
        if operator.token.trim().is_empty() {
            errors.push(ValidationError::new("auth.operators", "token must not be empty"));
        } else if !tokens.insert(operator.token.as_str()) {
            errors.push(ValidationError::new(
                "auth.operators",
                format!("duplicate token for owner {}", operator.owner_id),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
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
    use crate::config::schema::OperatorCredential;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ControlPlaneConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ControlPlaneConfig::default();
        config.listener.bind_address = "nope".into();
        config.gateway.send_timeout_ms = 0;
        config.database.url = "postgres://db".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "listener.bind_address");
    }

    #[test]
    fn test_duplicate_operator_tokens_rejected() {
        let mut config = ControlPlaneConfig::default();
        config.auth.operators = vec![
            OperatorCredential { token: "t".into(), owner_id: 1 },
            OperatorCredential { token: "t".into(), owner_id: 2 },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("duplicate token for owner 2"));
    }
}
