//! HTTP mapping for control-plane errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ControlPlaneError;

/// Error returned by every operator and gateway handler.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or unknown operator token.
    Unauthorized,
    /// A failed control-plane operation.
    ControlPlane(ControlPlaneError),
}

impl From<ControlPlaneError> for ApiError {
    fn from(err: ControlPlaneError) -> Self {
        Self::ControlPlane(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Missing or invalid operator token" }),
            ),
            Self::ControlPlane(ControlPlaneError::Validation(errors)) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Validation failed", "errors": errors }),
            ),
            Self::ControlPlane(ControlPlaneError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                json!({ "message": format!("API configuration {id} not found") }),
            ),
            Self::ControlPlane(ControlPlaneError::Conflict(reason)) => {
                tracing::debug!(reason = %reason, "Store rejected write");
                (
                    StatusCode::CONFLICT,
                    json!({ "message": "API configuration conflicts with an existing route" }),
                )
            }
            Self::ControlPlane(ControlPlaneError::Storage(reason)) => {
                tracing::error!(error = %reason, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
