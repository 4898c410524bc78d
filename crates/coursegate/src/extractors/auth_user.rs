use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth;
use crate::controllers::AppState;
use crate::error::ApiError;

/// `Bearer` token from the `Authorization` header.
pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

/// Extractor that validates the session JWT and provides the user ID.
///
/// Usage in handlers:
/// ```rust,ignore
/// async fn my_handler(AuthUser(user_id): AuthUser) -> impl IntoResponse {
///     // user_id is the authenticated user's ID
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i32);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = auth::validate_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser(claims.user_id()?))
    }
}
