use axum::{
    extract::State,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::extractors::{AdminUser, ValidatedJson};
use crate::models::coupon::{self, CouponResponse};
use crate::models::course;
use crate::response::{ApiResponse, Created};

use super::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters"))]
    pub code: String,
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub discount_percent: i32,
    /// Restrict the coupon to one course
    pub course_id: Option<i32>,
    #[validate(range(min = 1, message = "must be positive"))]
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/coupons", post(create_coupon))
}

/// Create a percentage discount code. Codes are stored upper-case.
#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<CouponResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn create_coupon(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateCouponRequest>,
) -> Result<Created<CouponResponse>, ApiError> {
    let code = payload.code.trim().to_uppercase();
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ApiError::Validation(
            "code may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    if let Some(course_id) = payload.course_id {
        course::Entity::find_by_id(course_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
    }

    let exists = coupon::Entity::find()
        .filter(coupon::Column::Code.eq(&code))
        .one(&state.db)
        .await?;
    if exists.is_some() {
        return Err(ApiError::Conflict(format!("Coupon {} already exists", code)));
    }

    let created = coupon::ActiveModel {
        code: Set(code),
        discount_percent: Set(payload.discount_percent),
        course_id: Set(payload.course_id),
        is_active: Set(true),
        max_uses: Set(payload.max_uses),
        used_count: Set(0),
        expires_at: Set(payload.expires_at.map(|t| t.naive_utc())),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(coupon_id = created.id, admin_id = admin.id, code = %created.code, "coupon created");
    Ok(Created(ApiResponse::success(created.into())))
}
