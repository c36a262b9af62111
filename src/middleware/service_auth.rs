//! Service Authentication Middleware
//!
//! Guards the /internal routes: calls from other platform services must
//! carry the shared service token as a bearer credential.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::shared::AppError;
use crate::startup::AppState;

/// Middleware that validates the service-to-service bearer token.
pub async fn service_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    if token != state.settings.internal.service_token {
        return Err(AppError::Forbidden("Invalid service token".into()));
    }

    Ok(next.run(request).await)
}
