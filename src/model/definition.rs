//! Operator-supplied route definitions and their validation.
//!
//! The wire shape follows the operator tooling (camelCase, nested `loadBalancing` and
//! `security` objects). Required strings default to empty so that a missing field is
//! reported as a validation error rather than a deserialization failure.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::Method;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::route::{AuthType, LbAlgorithm, RouteStatus};

/// Longest name, URL or target the store accepts, in characters.
pub const MAX_FIELD_LEN: usize = 255;

/// Longest HTTP method the store accepts.
pub const MAX_METHOD_LEN: usize = 20;

/// A route as submitted on create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteDefinition {
    pub name: String,
    pub exposed_url: String,
    pub target_url: String,
    pub method: String,
    #[serde(alias = "authenticationType", deserialize_with = "auth_type_or_default")]
    pub auth_type: AuthType,
    pub rate_limit: Option<i64>,
    /// `None` keeps the current status on update and means active on create.
    pub status: Option<RouteStatus>,
    pub load_balancing: LoadBalancing,
    pub security: SecurityPolicy,
}

/// Load-balancing section of a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancing {
    pub enabled: bool,
    #[serde(deserialize_with = "empty_as_none")]
    pub algorithm: Option<LbAlgorithm>,
    pub targets: Vec<String>,
}

/// Security section of a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPolicy {
    pub cors: bool,
    pub ssl: bool,
    #[serde(alias = "ipWhitelist", deserialize_with = "allow_list")]
    pub ip_allow_list: Vec<String>,
}

/// Operator tooling sends `""` when no algorithm is chosen.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<LbAlgorithm>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn auth_type_or_default<'de, D>(deserializer: D) -> Result<AuthType, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(AuthType::None),
        Some(s) if s.trim().is_empty() => Ok(AuthType::None),
        Some(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Accepts either a list or a comma-separated string.
fn allow_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::List(items)) => items,
        Some(Raw::Text(text)) => text.split(',').map(str::to_string).collect(),
    })
}

impl RouteDefinition {
    /// Check required fields and normalize the definition.
    ///
    /// Collects every problem before failing. On success strings are trimmed, the method is
    /// upper-cased, the allow-list is deduplicated in order, and the algorithm defaults to
    /// round-robin when load balancing is enabled (and is dropped when it is not).
    pub fn validated(mut self) -> ControlPlaneResult<Self> {
        let mut errors = Vec::new();

        self.name = self.name.trim().to_string();
        self.exposed_url = self.exposed_url.trim().to_string();
        self.target_url = self.target_url.trim().to_string();
        self.method = self.method.trim().to_ascii_uppercase();

        if self.name.is_empty() {
            errors.push("name is required".to_string());
        }

        if self.exposed_url.is_empty() {
            errors.push("exposedUrl is required".to_string());
        } else if !self.exposed_url.starts_with('/') && !is_http_url(&self.exposed_url) {
            errors.push(format!(
                "exposedUrl '{}' must be a path or an absolute URL",
                self.exposed_url
            ));
        }

        if self.target_url.is_empty() {
            errors.push("targetUrl is required".to_string());
        } else if !is_http_url(&self.target_url) {
            errors.push(format!("targetUrl '{}' is not an http(s) URL", self.target_url));
        }

        if self.method.is_empty() {
            errors.push("method is required".to_string());
        } else if Method::from_bytes(self.method.as_bytes()).is_err() {
            errors.push(format!("method '{}' is not a valid HTTP method", self.method));
        }

        check_len(&mut errors, "name", &self.name, MAX_FIELD_LEN);
        check_len(&mut errors, "exposedUrl", &self.exposed_url, MAX_FIELD_LEN);
        check_len(&mut errors, "targetUrl", &self.target_url, MAX_FIELD_LEN);
        check_len(&mut errors, "method", &self.method, MAX_METHOD_LEN);

        if let Some(limit) = self.rate_limit {
            if limit <= 0 {
                errors.push(format!("rateLimit must be positive, got {limit}"));
            }
        }

        if self.load_balancing.enabled {
            self.load_balancing.algorithm.get_or_insert(LbAlgorithm::RoundRobin);
            for target in &mut self.load_balancing.targets {
                *target = target.trim().to_string();
                if target.chars().count() > MAX_FIELD_LEN {
                    errors.push(format!(
                        "load balancing target must be at most {MAX_FIELD_LEN} characters"
                    ));
                } else if !is_http_url(target) {
                    errors.push(format!("load balancing target '{target}' is not an http(s) URL"));
                }
            }
        } else {
            self.load_balancing.algorithm = None;
        }

        let mut seen = HashSet::new();
        let mut allow_list = Vec::with_capacity(self.security.ip_allow_list.len());
        for entry in &self.security.ip_allow_list {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            if !is_ip_or_cidr(entry) {
                errors.push(format!("ipWhitelist entry '{entry}' is not an IP address or CIDR block"));
            } else if seen.insert(entry.to_string()) {
                allow_list.push(entry.to_string());
            }
        }
        self.security.ip_allow_list = allow_list;

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ControlPlaneError::Validation(errors))
        }
    }
}

fn check_len(errors: &mut Vec<String>, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(format!("{field} must be at most {max} characters"));
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

fn is_ip_or_cidr(entry: &str) -> bool {
    match entry.split_once('/') {
        None => entry.parse::<IpAddr>().is_ok(),
        Some((addr, prefix)) => {
            let Ok(addr) = addr.parse::<IpAddr>() else {
                return false;
            };
            let max = if addr.is_ipv4() { 32 } else { 128 };
            prefix.parse::<u8>().map(|p| p <= max).unwrap_or(false)
        }
    }
}
