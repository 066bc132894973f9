//! Persisted route records and their enumerated attributes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            /// Canonical string form, as stored and serialized.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text $(| $alias)* => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// How a gateway authenticates callers of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Token,
    #[serde(alias = "api-key", alias = "apiKey")]
    ApiKey,
    Basic,
}

string_enum!(AuthType, "authentication type", {
    None => "none",
    Token => "token",
    ApiKey => "api_key" | "api-key" | "apiKey",
    Basic => "basic",
});

/// Whether a route is part of the servable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    #[default]
    Active,
    Inactive,
}

string_enum!(RouteStatus, "status", {
    Active => "active",
    Inactive => "inactive",
});

/// Backend selection strategy for load-balanced routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LbAlgorithm {
    #[default]
    #[serde(alias = "round_robin", alias = "roundRobin")]
    RoundRobin,
    #[serde(alias = "least_connections", alias = "leastConnections")]
    LeastConnections,
}

string_enum!(LbAlgorithm, "load balancing algorithm", {
    RoundRobin => "round-robin" | "round_robin" | "roundRobin",
    LeastConnections => "least-connections" | "least_connections" | "leastConnections",
});

/// Kind of committed mutation carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

string_enum!(ChangeKind, "operation", {
    Create => "create",
    Update => "update",
    Delete => "delete",
});

/// One exposed-route definition as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: i64,
    #[serde(rename = "user_id")]
    pub owner_id: i64,
    pub name: String,
    pub exposed_url: String,
    pub target_url: String,
    pub method: String,
    pub authentication_type: AuthType,
    pub rate_limit: Option<i64>,
    pub status: RouteStatus,
    pub load_balancing_enabled: bool,
    pub load_balancing_algorithm: Option<LbAlgorithm>,
    pub security_cors: bool,
    pub security_ssl: bool,
    pub security_ip_allow_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An additional backend for a load-balanced route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancingTarget {
    pub id: i64,
    pub route_id: i64,
    pub target_url: String,
}

/// A route together with its full target list, as returned by `get_route`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteWithTargets {
    #[serde(flatten)]
    pub route: RouteConfig,
    pub load_balancing_targets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_text() {
        assert_eq!("round-robin".parse::<LbAlgorithm>().unwrap(), LbAlgorithm::RoundRobin);
        assert_eq!("roundRobin".parse::<LbAlgorithm>().unwrap(), LbAlgorithm::RoundRobin);
        assert_eq!(LbAlgorithm::LeastConnections.as_str(), "least-connections");
        assert_eq!(ChangeKind::Delete.to_string(), "delete");
    }

    #[test]
    fn test_unknown_variant_is_reported() {
        let err = "paused".parse::<RouteStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown status 'paused'");
    }

    #[test]
    fn test_owner_serializes_as_user_id() {
        let now = Utc::now();
        let route = RouteConfig {
            id: 1,
            owner_id: 9,
            name: "svc1".into(),
            exposed_url: "/svc1".into(),
            target_url: "http://a".into(),
            method: "GET".into(),
            authentication_type: AuthType::None,
            rate_limit: None,
            status: RouteStatus::Active,
            load_balancing_enabled: false,
            load_balancing_algorithm: None,
            security_cors: false,
            security_ssl: false,
            security_ip_allow_list: vec![],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["user_id"], 9);
        assert_eq!(json["status"], "active");
        assert!(json.get("owner_id").is_none());
    }
}
