//! Control-plane error taxonomy.
//!
//! Every repository failure is surfaced as a [`ControlPlaneError`] only after the
//! enclosing transaction has been rolled back. Channel failures have their own type
//! ([`crate::gateway::ChannelError`]) and never reach a mutation caller.

use thiserror::Error;

/// Errors produced by the route store, repository and snapshot provider.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Malformed or missing input. Never committed, never notified.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Route does not exist or is not owned by the caller.
    #[error("Route {0} not found")]
    NotFound(i64),

    /// A store constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store was unreachable or the transaction failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ControlPlaneError {
    /// Convenience constructor for a single validation message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

/// Result type for control-plane operations.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Map a sqlx error onto the control-plane taxonomy.
///
/// Uniqueness and reference violations become [`ControlPlaneError::Conflict`]. CHECK and
/// NOT NULL violations are bad input that slipped past [`RouteDefinition::validated`] and
/// become [`ControlPlaneError::Validation`]. Anything else is a storage failure.
///
/// [`RouteDefinition::validated`]: crate::model::RouteDefinition::validated
pub(crate) fn map_sqlx_err(err: sqlx::Error) -> ControlPlaneError {
    if let sqlx::Error::Database(db) = &err {
        use sqlx::error::ErrorKind;
        match db.kind() {
            ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation => {
                return ControlPlaneError::Conflict(db.message().to_string());
            }
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                return ControlPlaneError::invalid(db.message().to_string());
            }
            _ => {}
        }
    }
    ControlPlaneError::Storage(err.to_string())
}
