use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
};

use crate::error::ApiError;
use crate::extractors::AdminUser;
use crate::import::ImportSummary;
use crate::response::ApiResponse;
use crate::storage::validate_extension;

use super::AppState;

const IMPORT_EXTENSIONS: &[&str] = &["csv"];

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/import/users", post(import_users))
}

/// Create accounts from an uploaded CSV and enroll them by label.
///
/// A bad row is reported in the summary and never aborts the batch.
#[utoipa::path(
    post,
    path = "/api/admin/import/users",
    request_body(content_type = "multipart/form-data", description = "CSV file in the `file` field"),
    responses(
        (status = 200, description = "Import finished", body = ApiResponse<ImportSummary>),
        (status = 400, description = "No file, wrong type or no email column"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn import_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> Result<ApiResponse<ImportSummary>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let received = state
            .storage
            .receive_field(field, state.config.max_upload_size)
            .await?;
        validate_extension(&received.original_name, IMPORT_EXTENSIONS)?;
        upload = Some(received);
    }

    let upload = upload
        .filter(|u| u.size > 0)
        .ok_or_else(|| ApiError::Validation("Upload a CSV file in the 'file' field".to_string()))?;

    tracing::info!(
        admin_id = admin.id,
        file = %upload.original_name,
        size = upload.size,
        "bulk import started"
    );
    // The temp file goes away when `upload` drops, whatever the outcome.
    let summary = state.importer.import_path(upload.path()).await?;

    Ok(ApiResponse::success(summary))
}
