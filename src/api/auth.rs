//! Operator bearer-token authentication.
//!
//! Tokens come from `auth.operators` in the config file. A valid token attaches the
//! operator's [`Owner`] to the request; every route operation is scoped to it.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error::ApiError;
use crate::http::server::AppState;

/// Authenticated operator, inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub i64);

pub async fn operator_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(owner_id) = token.and_then(|t| state.operators.get(t)).copied() else {
        tracing::debug!(path = %request.uri().path(), "Rejected operator request");
        return Err(ApiError::Unauthorized);
    };

    request.extensions_mut().insert(Owner(owner_id));
    Ok(next.run(request).await)
}
