use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use reqwest::Url;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Capability;
use crate::error::ApiError;
use crate::extractors::{AdminUser, AuthUser};
use crate::media::mime::{DOCUMENT_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::models::content_item::{self, ContentType, StoredFile};
use crate::models::course;
use crate::response::{ApiResponse, Created};
use crate::services::progress;
use crate::storage::{validate_extension, PendingUpload};

use super::media::{secure_url, SecureUrl};
use super::AppState;

/// A content item as listed to learners.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContentSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub order: i32,
    pub is_free_preview: bool,
    /// True when the description is hidden. Free previews are unlocked, but
    /// media URLs are only minted for enrolled callers.
    pub locked: bool,
    pub video: Option<SecureUrl>,
    pub document: Option<SecureUrl>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseContents {
    pub course_id: i32,
    pub enrolled: bool,
    pub items: Vec<ContentSummary>,
}

/// Admin view of a content item.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContentResponse {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub order: i32,
    pub is_free_preview: bool,
    pub is_active: bool,
    pub video_url: Option<String>,
    pub video_file: Option<StoredFile>,
    pub document_url: Option<String>,
    pub document_file: Option<StoredFile>,
}

impl From<content_item::Model> for ContentResponse {
    fn from(m: content_item::Model) -> Self {
        let file = |source| match source {
            Some(content_item::MediaSource::Uploaded(f)) => Some(f),
            _ => None,
        };
        ContentResponse {
            video_file: file(m.video_source()),
            document_file: file(m.document_source()),
            id: m.id,
            course_id: m.course_id,
            title: m.title,
            description: m.description,
            content_type: m.content_type,
            order: m.sort_order,
            is_free_preview: m.is_free_preview,
            is_active: m.is_active,
            video_url: m.video_url,
            document_url: m.document_url,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/contents", get(list_contents))
        .route("/admin/courses/{course_id}/contents", post(create_content))
        .route(
            "/admin/contents/{id}",
            patch(update_content).delete(delete_content),
        )
}

// ── Multipart form ──

/// Fields of the create/update form. Everything is optional at this stage;
/// the handlers decide what is required.
#[derive(Default)]
struct ContentForm {
    title: Option<String>,
    description: Option<String>,
    content_type: Option<ContentType>,
    order: Option<i32>,
    is_free_preview: Option<bool>,
    is_active: Option<bool>,
    video_url: Option<String>,
    document_url: Option<String>,
    video_file: Option<PendingUpload>,
    document_file: Option<PendingUpload>,
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ApiError::Validation(format!("{} must be a boolean", name))),
    }
}

fn parse_media_url(name: &str, value: &str) -> Result<Option<String>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(value.to_string())),
        _ => Err(ApiError::Validation(format!("{} must be an http(s) URL", name))),
    }
}

/// The slot a content type is served from must be filled.
fn check_slots(content_type: ContentType, has_video: bool, has_document: bool) -> Result<(), ApiError> {
    if !has_video && !has_document {
        return Err(ApiError::Validation(
            "Provide a video or a document (URL or file)".to_string(),
        ));
    }
    if content_type == ContentType::Video && !has_video {
        return Err(ApiError::Validation(
            "Video content needs a video URL or file".to_string(),
        ));
    }
    if content_type != ContentType::Video && !has_document {
        return Err(ApiError::Validation(format!(
            "{} content needs a document URL or file",
            content_type.as_str()
        )));
    }
    Ok(())
}

async fn read_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<ContentForm, ApiError> {
    let mut form = ContentForm::default();
    let max_size = state.config.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" | "video_file" | "document" | "document_file" => {
                if field.file_name().is_none() {
                    continue;
                }
                let upload = state.storage.receive_field(field, max_size).await?;
                // Browsers send an empty part for an untouched file input.
                if upload.size == 0 {
                    continue;
                }
                if name.starts_with("video") {
                    validate_extension(&upload.original_name, VIDEO_EXTENSIONS)?;
                    form.video_file = Some(upload);
                } else {
                    validate_extension(&upload.original_name, DOCUMENT_EXTENSIONS)?;
                    form.document_file = Some(upload);
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Unreadable field '{}': {}", name, e)))?;
                match name.as_str() {
                    "title" => form.title = Some(value.trim().to_string()),
                    "description" => form.description = Some(value),
                    "content_type" => {
                        form.content_type = Some(ContentType::parse(&value).ok_or_else(|| {
                            ApiError::Validation(format!("Unknown content_type '{}'", value))
                        })?)
                    }
                    "order" => {
                        form.order = Some(value.trim().parse().map_err(|_| {
                            ApiError::Validation("order must be an integer".to_string())
                        })?)
                    }
                    "is_free_preview" => form.is_free_preview = Some(parse_bool(&name, &value)?),
                    "is_active" => form.is_active = Some(parse_bool(&name, &value)?),
                    "video_url" => form.video_url = parse_media_url(&name, &value)?,
                    "document_url" => form.document_url = parse_media_url(&name, &value)?,
                    other => tracing::debug!(field = other, "ignoring unknown form field"),
                }
            }
        }
    }

    if form.video_url.is_some() && form.video_file.is_some() {
        return Err(ApiError::Validation(
            "Provide either a video URL or a video file, not both".to_string(),
        ));
    }
    if form.document_url.is_some() && form.document_file.is_some() {
        return Err(ApiError::Validation(
            "Provide either a document URL or a document file, not both".to_string(),
        ));
    }
    Ok(form)
}

async fn persist_optional(
    state: &AppState,
    upload: Option<PendingUpload>,
) -> Result<Option<StoredFile>, ApiError> {
    match upload {
        Some(u) => Ok(Some(state.storage.persist(u).await?)),
        None => Ok(None),
    }
}

fn set_video(active: &mut content_item::ActiveModel, url: Option<String>, file: Option<&StoredFile>) {
    active.video_url = Set(url);
    active.video_file_path = Set(file.map(|f| f.stored_name.clone()));
    active.video_file_name = Set(file.map(|f| f.original_name.clone()));
    active.video_file_size = Set(file.map(|f| f.size));
    active.video_mime_type = Set(file.map(|f| f.mime_type.clone()));
}

fn set_document(
    active: &mut content_item::ActiveModel,
    url: Option<String>,
    file: Option<&StoredFile>,
) {
    active.document_url = Set(url);
    active.document_file_path = Set(file.map(|f| f.stored_name.clone()));
    active.document_file_name = Set(file.map(|f| f.original_name.clone()));
    active.document_file_size = Set(file.map(|f| f.size));
    active.document_mime_type = Set(file.map(|f| f.mime_type.clone()));
}

async fn discard(state: &AppState, files: &[Option<StoredFile>]) {
    for f in files.iter().flatten() {
        state.storage.delete_logged(&f.stored_name).await;
    }
}

// ── Handlers ──

/// Add a content item to a course.
#[utoipa::path(
    post,
    path = "/api/admin/courses/{course_id}/contents",
    params(("course_id" = i32, Path, description = "Course ID")),
    request_body(content_type = "multipart/form-data", description = "title, content_type, order, is_free_preview, video_url | video, document_url | document"),
    responses(
        (status = 201, description = "Content created", body = ApiResponse<ContentResponse>),
        (status = 400, description = "Invalid form"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn create_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(course_id): Path<i32>,
    multipart: Multipart,
) -> Result<Created<ContentResponse>, ApiError> {
    course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let form = read_form(&state, multipart).await?;

    let title = form
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("title is required".to_string()))?;
    let content_type = form
        .content_type
        .ok_or_else(|| ApiError::Validation("content_type is required".to_string()))?;

    let has_video = form.video_url.is_some() || form.video_file.is_some();
    let has_document = form.document_url.is_some() || form.document_file.is_some();
    check_slots(content_type, has_video, has_document)?;

    let video_file = persist_optional(&state, form.video_file).await?;
    let document_file = match persist_optional(&state, form.document_file).await {
        Ok(f) => f,
        Err(e) => {
            discard(&state, &[video_file]).await;
            return Err(e);
        }
    };

    let now = Utc::now().naive_utc();
    let mut active = content_item::ActiveModel {
        course_id: Set(course_id),
        title: Set(title),
        description: Set(form.description.filter(|d| !d.trim().is_empty())),
        content_type: Set(content_type.as_str().to_string()),
        sort_order: Set(form.order.unwrap_or(0)),
        is_free_preview: Set(form.is_free_preview.unwrap_or(false)),
        is_active: Set(form.is_active.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    set_video(&mut active, form.video_url, video_file.as_ref());
    set_document(&mut active, form.document_url, document_file.as_ref());

    let created = match active.insert(&state.db).await {
        Ok(m) => m,
        Err(e) => {
            discard(&state, &[video_file, document_file]).await;
            return Err(e.into());
        }
    };

    tracing::info!(content_id = created.id, course_id, admin_id = admin.id, "content created");
    Ok(Created(ApiResponse::success(created.into())))
}

/// Update a content item. A new URL or file replaces what was in that slot.
#[utoipa::path(
    patch,
    path = "/api/admin/contents/{id}",
    params(("id" = i32, Path, description = "Content item ID")),
    request_body(content_type = "multipart/form-data", description = "Any create field"),
    responses(
        (status = 200, description = "Content updated", body = ApiResponse<ContentResponse>),
        (status = 400, description = "The content type has no media in its slot"),
        (status = 404, description = "Content not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn update_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<ApiResponse<ContentResponse>, ApiError> {
    let existing = content_item::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Content not found".to_string()))?;

    let form = read_form(&state, multipart).await?;

    // Validate the merged item before anything is persisted.
    let content_type = form
        .content_type
        .or_else(|| existing.kind())
        .ok_or_else(|| ApiError::Internal(format!("Content {} has an unknown type", id)))?;
    let has_video = form.video_url.is_some()
        || form.video_file.is_some()
        || existing.video_source().is_some();
    let has_document = form.document_url.is_some()
        || form.document_file.is_some()
        || existing.document_source().is_some();
    check_slots(content_type, has_video, has_document)?;

    let video_file = persist_optional(&state, form.video_file).await?;
    let document_file = match persist_optional(&state, form.document_file).await {
        Ok(f) => f,
        Err(e) => {
            discard(&state, &[video_file]).await;
            return Err(e);
        }
    };

    let mut replaced = Vec::new();
    let mut active: content_item::ActiveModel = existing.clone().into();

    if let Some(title) = form.title.filter(|t| !t.is_empty()) {
        active.title = Set(title);
    }
    if let Some(description) = form.description {
        active.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
    }
    active.content_type = Set(content_type.as_str().to_string());
    if let Some(order) = form.order {
        active.sort_order = Set(order);
    }
    if let Some(flag) = form.is_free_preview {
        active.is_free_preview = Set(flag);
    }
    if let Some(flag) = form.is_active {
        active.is_active = Set(flag);
    }
    if form.video_url.is_some() || video_file.is_some() {
        replaced.extend(existing.video_file_path.clone());
        set_video(&mut active, form.video_url, video_file.as_ref());
    }
    if form.document_url.is_some() || document_file.is_some() {
        replaced.extend(existing.document_file_path.clone());
        set_document(&mut active, form.document_url, document_file.as_ref());
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = match active.update(&state.db).await {
        Ok(m) => m,
        Err(e) => {
            discard(&state, &[video_file, document_file]).await;
            return Err(e.into());
        }
    };

    for name in replaced.iter().filter(|n| !n.is_empty()) {
        state.storage.delete_logged(name).await;
    }

    tracing::info!(content_id = id, admin_id = admin.id, replaced = replaced.len(), "content updated");
    Ok(ApiResponse::success(updated.into()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedContent {
    pub id: i32,
    pub progress_records_removed: u64,
}

/// Delete a content item, its files and every progress record pointing at it.
///
/// Files that cannot be removed are logged; the record is deleted regardless.
#[utoipa::path(
    delete,
    path = "/api/admin/contents/{id}",
    params(("id" = i32, Path, description = "Content item ID")),
    responses(
        (status = 200, description = "Content deleted", body = ApiResponse<DeletedContent>),
        (status = 404, description = "Content not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn delete_content(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> Result<ApiResponse<DeletedContent>, ApiError> {
    let existing = content_item::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Content not found".to_string()))?;

    for name in existing.stored_files() {
        state.storage.delete_logged(&name).await;
    }
    let removed = progress::delete_for_content(&state.db, id).await?;
    content_item::Entity::delete_by_id(id).exec(&state.db).await?;

    tracing::info!(content_id = id, admin_id = admin.id, progress_records = removed, "content deleted");
    Ok(ApiResponse::success(DeletedContent {
        id,
        progress_records_removed: removed,
    }))
}

/// Course outline for the caller.
///
/// Enrolled users (and admins) get fresh secure URLs for every item. Others
/// see the outline, with URLs only on free-preview items.
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/contents",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course contents", body = ApiResponse<CourseContents>),
        (status = 403, description = "Course inactive"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = [])),
    tag = "courses"
)]
async fn list_contents(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(course_id): Path<i32>,
) -> Result<ApiResponse<CourseContents>, ApiError> {
    let course = course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
    if !course.is_active {
        return Err(ApiError::Forbidden("Course is not available".to_string()));
    }

    let user = crate::models::user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    let enrolled = user.is_admin()
        || state
            .entitlement
            .completed_enrollment(user_id, course_id)
            .await?
            .is_some();

    let items = content_item::Entity::find()
        .filter(content_item::Column::CourseId.eq(course_id))
        .filter(content_item::Column::IsActive.eq(true))
        .order_by_asc(content_item::Column::SortOrder)
        .order_by_asc(content_item::Column::Id)
        .all(&state.db)
        .await?;

    let mut summaries = Vec::with_capacity(items.len());
    for item in items {
        let open = enrolled || item.is_free_preview;
        let (video, document) = if enrolled {
            (
                secure_url(&state, user_id, &item, Capability::MediaVideo)?,
                secure_url(&state, user_id, &item, Capability::MediaDocument)?,
            )
        } else {
            (None, None)
        };
        summaries.push(ContentSummary {
            id: item.id,
            title: item.title,
            description: if open { item.description } else { None },
            content_type: item.content_type,
            order: item.sort_order,
            is_free_preview: item.is_free_preview,
            locked: !open,
            video,
            document,
        });
    }

    Ok(ApiResponse::success(CourseContents {
        course_id,
        enrolled,
        items: summaries,
    }))
}
