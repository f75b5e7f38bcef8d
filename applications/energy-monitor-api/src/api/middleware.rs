use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::handlers::AppState;
use crate::auth::validate_token;
use crate::error::AppError;

pub const DEVICE_KEY_HEADER: &str = "x-device-key";

// User info extracted from authentication (either oauth2-proxy headers or JWT)
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

impl AuthenticatedUser {
    pub fn require_admin(&self, admin_users: &[String]) -> Result<(), AppError> {
        if admin_users.iter().any(|u| u == &self.username) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator access required".to_string()))
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

// Supports both:
// 1. oauth2-proxy headers (X-Auth-Request-User) - for the web frontend
// 2. HS256 Bearer tokens - for scripts and native clients
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let oauth2_user = request
        .headers()
        .get("x-auth-request-user")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    if let Some(username) = oauth2_user {
        debug!("Authenticated via oauth2-proxy: {}", username);
        request
            .extensions_mut()
            .insert(AuthenticatedUser { username });
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(|t| t.to_string())
        .ok_or_else(|| {
            debug!("No valid Authorization header found");
            StatusCode::UNAUTHORIZED
        })?;

    let secret = state.auth.jwt_secret.as_deref().ok_or_else(|| {
        debug!("Bearer token presented but no JWT secret configured");
        StatusCode::UNAUTHORIZED
    })?;

    let claims = validate_token(&token, secret).map_err(|e| {
        debug!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    debug!("Authenticated via JWT: sub={}", claims.sub);
    request.extensions_mut().insert(AuthenticatedUser {
        username: claims.sub,
    });

    Ok(next.run(request).await)
}
