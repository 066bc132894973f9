use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::auth::Owner;
use crate::api::error::ApiError;
use crate::error::ControlPlaneError;
use crate::gateway::ChannelInfo;
use crate::http::server::AppState;
use crate::model::{RouteConfig, RouteDefinition, RouteWithTargets};
use crate::snapshot::SnapshotRoute;

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<RouteConfig>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub api: RouteWithTargets,
}

#[derive(Debug, Serialize)]
pub struct RouteListResponse {
    pub apis: Vec<RouteConfig>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub apis: Vec<SnapshotRoute>,
}

#[derive(Debug, Serialize)]
pub struct GatewayListResponse {
    pub gateways: Vec<ChannelInfo>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub gateways: usize,
    pub last_sequence: u64,
}

fn body(payload: Result<Json<RouteDefinition>, JsonRejection>) -> Result<RouteDefinition, ApiError> {
    payload
        .map(|Json(def)| def)
        .map_err(|e| ControlPlaneError::invalid(e.body_text()).into())
}

fn route_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ControlPlaneError::invalid("route id must be an integer").into())
}

/// `POST /api/routes`
pub async fn create_route(
    State(state): State<AppState>,
    Extension(Owner(owner_id)): Extension<Owner>,
    payload: Result<Json<RouteDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let route = state.repository.create_route(owner_id, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            message: "API configuration created successfully",
            api: Some(route),
        }),
    ))
}

/// `GET /api/routes`
pub async fn list_routes(
    State(state): State<AppState>,
    Extension(Owner(owner_id)): Extension<Owner>,
) -> Result<Json<RouteListResponse>, ApiError> {
    let apis = state.repository.list_routes(owner_id).await?;
    Ok(Json(RouteListResponse { apis }))
}

/// `GET /api/routes/{id}`
pub async fn get_route(
    State(state): State<AppState>,
    Extension(Owner(owner_id)): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let api = state.repository.get_route(route_id(path)?, owner_id).await?;
    Ok(Json(RouteResponse { api }))
}

/// `PUT /api/routes/{id}`
pub async fn update_route(
    State(state): State<AppState>,
    Extension(Owner(owner_id)): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RouteDefinition>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = route_id(path)?;
    let route = state.repository.update_route(id, owner_id, body(payload)?).await?;
    Ok(Json(MutationResponse {
        message: "API configuration updated successfully",
        api: Some(route),
    }))
}

/// `DELETE /api/routes/{id}`
pub async fn delete_route(
    State(state): State<AppState>,
    Extension(Owner(owner_id)): Extension<Owner>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    state.repository.delete_route(route_id(path)?, owner_id).await?;
    Ok(Json(MutationResponse {
        message: "API configuration deleted successfully",
        api: None,
    }))
}

/// `GET /api/gateways`
pub async fn list_gateways(State(state): State<AppState>) -> Json<GatewayListResponse> {
    Json(GatewayListResponse {
        gateways: state.channels.channels(),
    })
}

/// `GET /gateway/config`: the snapshot gateways reconcile against.
pub async fn gateway_config(State(state): State<AppState>) -> Result<Json<SnapshotResponse>, ApiError> {
    let apis = state.snapshots.active_snapshot().await?;
    Ok(Json(SnapshotResponse { apis }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let database_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the route store");
            false
        }
    };

    let status = HealthStatus {
        status: if database_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if database_ok { "up" } else { "down" },
        gateways: state.channels.connected_count(),
        last_sequence: state.notifier.last_sequence(),
    };
    let code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
