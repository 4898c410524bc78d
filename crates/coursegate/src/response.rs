use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ErrorDetail;

/// Standard API response wrapper.
///
/// All JSON endpoints return this format:
/// ```json
/// {
///   "success": true,
///   "data": { ... }
/// }
/// ```
/// Failures carry `"success": false`, a top-level `message` and an `error`
/// object with a machine readable code.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    /// Successful response with a human readable message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, axum::Json(self)).into_response()
    }
}

/// Wraps a response to send it with `201 Created`.
pub struct Created<T: Serialize>(pub ApiResponse<T>);

impl<T: Serialize> axum::response::IntoResponse for Created<T> {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::CREATED, axum::Json(self.0)).into_response()
    }
}
