use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::EntityTrait;

use crate::controllers::AppState;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::user;

/// The authenticated user's record. Rejects deactivated accounts.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = user::Entity::find_by_id(user_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
        if !user.is_active {
            return Err(ApiError::Forbidden("Account is deactivated".to_string()));
        }
        Ok(CurrentUser(user))
    }
}

/// An active account with the `admin` role.
///
/// ```rust,ignore
/// async fn admin_handler(AdminUser(admin): AdminUser) -> impl IntoResponse {
///     // only reached by administrators
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminUser(pub user::Model);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::debug!(user_id = user.id, "admin route refused");
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
