use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::Config;
use crate::response::ApiResponse;

/// Standard error type for every HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RangeNotSatisfiable { .. } => "RANGE_NOT_SATISFIABLE",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Message shown to the client. Internal and upstream failures are
    /// always redacted here; [`ErrorExposure`] may put the detail back.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) | ApiError::Database(_) => "Internal server error".to_string(),
            ApiError::Upstream(_) => "Upstream provider error".to_string(),
            _ => self.to_string(),
        }
    }

    fn is_redacted(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Upstream(_)
        )
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Unredacted error text, carried as a response extension.
#[derive(Debug, Clone)]
struct RedactedDetail {
    code: &'static str,
    message: String,
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        message: Some(message.clone()),
        data: None,
        error: Some(ErrorDetail {
            code: code.to_string(),
            message,
        }),
    };
    (status, axum::Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }

        // 416 carries no body, only the size of the representation.
        if let ApiError::RangeNotSatisfiable { size } = self {
            let mut res = status.into_response();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                res.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            return res;
        }

        let mut res = error_body(status, self.error_code(), self.public_message());
        if self.is_redacted() {
            res.extensions_mut().insert(RedactedDetail {
                code: self.error_code(),
                message: self.to_string(),
            });
        }
        res
    }
}

/// Whether redacted error details reach clients. Built by `App` from the
/// configured environment; only development reveals them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorExposure {
    reveal: bool,
}

impl ErrorExposure {
    pub fn new(reveal: bool) -> Self {
        ErrorExposure { reveal }
    }

    pub fn for_config(config: &Config) -> Self {
        Self::new(config.is_dev())
    }

    /// Strip the unredacted detail from `res`, rewriting the body with it
    /// first when revealing is enabled.
    pub fn apply(self, mut res: Response) -> Response {
        let Some(detail) = res.extensions_mut().remove::<RedactedDetail>() else {
            return res;
        };
        if !self.reveal {
            return res;
        }
        error_body(res.status(), detail.code, detail.message)
    }
}

/// Response middleware applying the app's [`ErrorExposure`].
///
/// ```rust,ignore
/// router.layer(axum::middleware::from_fn_with_state(exposure, expose_errors))
/// ```
pub async fn expose_errors(
    State(exposure): State<ErrorExposure>,
    req: Request,
    next: Next,
) -> Response {
    exposure.apply(next.run(req).await)
}
