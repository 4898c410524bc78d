use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::extractors::{AdminUser, Pagination, ValidatedJson};
use crate::models::course::{self, slugify, CourseResponse};
use crate::response::{ApiResponse, Created};

use super::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub title: String,
    /// Defaults to a slug of the title
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Minor currency units
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub price: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/admin/courses", post(create_course))
        .route("/admin/courses/{id}", patch(update_course))
}

/// Active courses, oldest first.
#[utoipa::path(
    get,
    path = "/api/courses",
    params(Pagination),
    responses((status = 200, description = "Course catalog", body = ApiResponse<Vec<CourseResponse>>)),
    tag = "courses"
)]
async fn list_courses(
    State(state): State<AppState>,
    pagination: Pagination,
) -> Result<ApiResponse<Vec<CourseResponse>>, ApiError> {
    let courses = course::Entity::find()
        .filter(course::Column::IsActive.eq(true))
        .order_by_asc(course::Column::CreatedAt)
        .order_by_asc(course::Column::Id)
        .offset(pagination.offset)
        .limit(pagination.limit)
        .all(&state.db)
        .await?;

    Ok(ApiResponse::success(
        courses.into_iter().map(CourseResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course", body = ApiResponse<CourseResponse>),
        (status = 404, description = "No such active course")
    ),
    tag = "courses"
)]
async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<CourseResponse>, ApiError> {
    let course = course::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
    Ok(ApiResponse::success(course.into()))
}

#[utoipa::path(
    post,
    path = "/api/admin/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = ApiResponse<CourseResponse>),
        (status = 409, description = "Slug already used")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn create_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(payload): ValidatedJson<CreateCourseRequest>,
) -> Result<Created<CourseResponse>, ApiError> {
    let slug = payload
        .slug
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&payload.title));
    if slug.is_empty() {
        return Err(ApiError::Validation(
            "Course title must contain letters or digits".to_string(),
        ));
    }

    let taken = course::Entity::find()
        .filter(course::Column::Slug.eq(&slug))
        .one(&state.db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::Conflict(format!("Slug '{}' is already in use", slug)));
    }

    let now = Utc::now().naive_utc();
    let created = course::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        slug: Set(slug),
        description: Set(payload.description),
        price: Set(payload.price),
        is_active: Set(payload.is_active),
        enrollment_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(course_id = created.id, admin_id = admin.id, slug = %created.slug, "course created");
    Ok(Created(ApiResponse::success(created.into())))
}

#[utoipa::path(
    patch,
    path = "/api/admin/courses/{id}",
    params(("id" = i32, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = ApiResponse<CourseResponse>),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn update_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateCourseRequest>,
) -> Result<ApiResponse<CourseResponse>, ApiError> {
    let existing = course::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let mut active: course::ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&state.db).await?;

    tracing::info!(course_id = id, admin_id = admin.id, "course updated");
    Ok(ApiResponse::success(updated.into()))
}
