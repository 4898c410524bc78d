use axum::{
    extract::{Path, State},
    routing::post,
    Router,
};

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::response::ApiResponse;
use crate::services::progress::{record_completion, ProgressSummary};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/contents/{content_id}/complete", post(complete_content))
}

/// Mark a content item as completed. Repeating the call changes nothing.
#[utoipa::path(
    post,
    path = "/api/contents/{content_id}/complete",
    params(("content_id" = i32, Path, description = "Content item ID")),
    responses(
        (status = 200, description = "Updated course progress", body = ApiResponse<ProgressSummary>),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Content not found")
    ),
    security(("bearer_auth" = [])),
    tag = "progress"
)]
async fn complete_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(content_id): Path<i32>,
) -> Result<ApiResponse<ProgressSummary>, ApiError> {
    let entitlement = state.entitlement.check(user_id, content_id).await?;
    let summary = record_completion(&state.db, user_id, &entitlement.content).await?;
    tracing::debug!(user_id, content_id, progress = summary.progress, "content completed");
    Ok(ApiResponse::success(summary))
}
