//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use bookrec_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

/// Extracts the auth session token from `Authorization: Bearer <token>`, falling
/// back to the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
}

/// Middleware that validates the auth session and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized; a failing store is a 500.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(token)
        .await
        .map_err(|e| rejection(&e))?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

fn rejection(e: &PortError) -> StatusCode {
    match e {
        PortError::Unauthorized | PortError::NotFound(_) => {
            debug!("Rejected auth session: {}", e);
            StatusCode::UNAUTHORIZED
        }
        _ => {
            error!("Auth session lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
