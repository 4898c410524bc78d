use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{AuthUser, CurrentUser, Json};
use crate::integrations::email::{self, send_in_background};
use crate::models::course::{self, CourseResponse};
use crate::models::enrollment::{self, EnrollmentResponse};
use crate::response::ApiResponse;
use crate::services::enrollment::{enroll, verify_payment, EnrollOutcome, VerifyResult};

use super::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub result: VerifyResult,
    pub enrollment: EnrollmentResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyEnrollment {
    pub enrollment: EnrollmentResponse,
    pub course: Option<CourseResponse>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/enroll", post(enroll_in_course))
        .route("/payments/verify", post(verify))
        .route("/enrollments", get(my_enrollments))
}

/// Enroll in a course. Free courses complete immediately; paid ones return a
/// payment order to complete with the gateway.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/enroll",
    params(("id" = i32, Path, description = "Course ID")),
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrolled or payment required", body = ApiResponse<EnrollOutcome>),
        (status = 400, description = "Coupon rejected"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled"),
        (status = 502, description = "Payment gateway failure")
    ),
    security(("bearer_auth" = [])),
    tag = "enrollments"
)]
async fn enroll_in_course(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<i32>,
    body: Bytes,
) -> Result<ApiResponse<EnrollOutcome>, ApiError> {
    // The body is optional: an empty POST enrolls without a coupon.
    let payload: EnrollRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EnrollRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid JSON: {}", e)))?
    };
    let outcome = enroll(
        &state.db,
        state.payments.as_ref(),
        &state.config.integrations.payment_currency,
        user.id,
        course_id,
        payload.coupon_code.as_deref(),
    )
    .await?;
    Ok(ApiResponse::success(outcome))
}

/// Confirm a payment with the gateway and settle the enrollment.
#[utoipa::path(
    post,
    path = "/api/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification result", body = ApiResponse<VerifyPaymentResponse>),
        (status = 404, description = "Unknown order"),
        (status = 502, description = "Payment gateway failure")
    ),
    security(("bearer_auth" = [])),
    tag = "enrollments"
)]
async fn verify(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<ApiResponse<VerifyPaymentResponse>, ApiError> {
    let order_id = payload.order_id.trim();
    if order_id.is_empty() {
        return Err(ApiError::Validation("order_id is required".to_string()));
    }

    let (result, settled) =
        verify_payment(&state.db, state.payments.as_ref(), user.id, order_id).await?;

    if result == VerifyResult::Completed {
        let title = course::Entity::find_by_id(settled.course_id)
            .one(&state.db)
            .await?
            .map(|c| c.title)
            .unwrap_or_else(|| "your course".to_string());
        send_in_background(
            state.email.clone(),
            email::payment_confirmation(
                &user.email,
                &title,
                settled.amount_paid,
                &state.config.integrations.payment_currency,
            ),
        );
    }

    Ok(ApiResponse::success(VerifyPaymentResponse {
        result,
        enrollment: settled.into(),
    }))
}

/// The caller's enrollments, newest first, with course details and progress.
#[utoipa::path(
    get,
    path = "/api/enrollments",
    responses((status = 200, description = "Enrollments", body = ApiResponse<Vec<MyEnrollment>>)),
    security(("bearer_auth" = [])),
    tag = "enrollments"
)]
async fn my_enrollments(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<ApiResponse<Vec<MyEnrollment>>, ApiError> {
    let enrollments = enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .order_by_desc(enrollment::Column::CreatedAt)
        .all(&state.db)
        .await?;
    let rows = with_courses(&state.db, enrollments).await?;

    Ok(ApiResponse::success(
        rows.into_iter()
            .map(|(e, c)| MyEnrollment {
                enrollment: e.into(),
                course: c.map(CourseResponse::from),
            })
            .collect(),
    ))
}

/// Enrollments with their courses. Entities carry no relations, so courses are
/// loaded in one extra query.
async fn with_courses(
    db: &DatabaseConnection,
    enrollments: Vec<enrollment::Model>,
) -> Result<Vec<(enrollment::Model, Option<course::Model>)>, ApiError> {
    let ids: Vec<i32> = enrollments.iter().map(|e| e.course_id).collect();
    let courses = course::Entity::find()
        .filter(course::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(enrollments
        .into_iter()
        .map(|e| {
            let c = courses.iter().find(|c| c.id == e.course_id).cloned();
            (e, c)
        })
        .collect())
}
