//! Control API: operator route management plus the gateway-facing snapshot.
//!
//! # Endpoints
//! ```text
//! operator (bearer token):
//!     POST   /api/routes          create
//!     GET    /api/routes          list own routes
//!     GET    /api/routes/{id}     one route with targets
//!     PUT    /api/routes/{id}     update
//!     DELETE /api/routes/{id}     delete
//!     GET    /api/gateways        connected gateway channels
//!
//! gateway (unauthenticated):
//!     GET    /gateway/config      active snapshot
//!     GET    /gateway/ws          push channel
//!     GET    /health
//! ```

pub mod auth;
pub mod error;
pub mod handlers;

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::gateway::session::gateway_ws;
use crate::http::server::AppState;

pub use auth::Owner;
pub use error::ApiError;

use self::auth::operator_auth;
use self::handlers::*;

/// Routes that require an operator token.
pub fn operator_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/routes", get(list_routes).post(create_route))
        .route(
            "/api/routes/{id}",
            get(get_route).put(update_route).delete(delete_route),
        )
        .route("/api/gateways", get(list_gateways))
        .route_layer(middleware::from_fn_with_state(state, operator_auth))
}

/// Routes gateways and probes use.
pub fn gateway_router() -> Router<AppState> {
    Router::new()
        .route("/gateway/config", get(gateway_config))
        .route("/gateway/ws", get(gateway_ws))
        .route("/health", get(health))
}
