use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::modules::auth::crud::UserCrud;
use crate::modules::auth::model::User;
use crate::AppState;

/// Identity attached to the request after a successful bearer check.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Option<String>,
}

/// Verifies the bearer access token and loads the user fresh from the
/// store so suspension and deletion take effect immediately, not at token
/// expiry.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Same checks as [`require_auth`], but a missing or invalid token
/// proceeds without a [`CurrentUser`] extension instead of rejecting.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Ok(current) = authenticate(&state, request.headers()).await {
        request.extensions_mut().insert(current);
    }
    next.run(request).await
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

    if token.is_empty() {
        return Err(ApiError::unauthorized("Empty bearer token"));
    }

    // Rejects refresh tokens as well as garbage: typ must be "access"
    let data = state
        .jwt_service
        .verify_access_token(token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let user = UserCrud::new(state.db.clone())
        .find_by_id(&data.claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    if !user.is_available() {
        return Err(ApiError::unauthorized("Account is not available"));
    }

    Ok(CurrentUser {
        user,
        session_id: data.claims.sid,
    })
}
