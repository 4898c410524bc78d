//! Token-gated media: minting secure URLs and serving the bytes behind them.
//!
//! Session auth is only used to mint tokens. The streaming endpoints are
//! reached by `<video>` and `<iframe>` elements that cannot send headers, so
//! they authenticate with the media token in the query string and re-check
//! the entitlement on every request.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{Capability, MediaAccess};
use crate::entitlement::Entitlement;
use crate::error::ApiError;
use crate::extractors::{AdminUser, AuthUser, Json};
use crate::media::headers::protect;
use crate::models::content_item::{self, MediaSource};
use crate::response::ApiResponse;

use super::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SecureUrl {
    pub content_id: i32,
    /// `video` or `document`
    pub media_type: String,
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The URL opens the wrapper page of an externally hosted video.
    pub embedded: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaQuery {
    /// Media access token
    pub token: Option<String>,
    /// Content the client expects the token to unlock
    #[serde(rename = "contentId")]
    pub content_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeResponse {
    pub revoked: bool,
    /// Seconds the revocation is remembered
    pub retention_secs: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/media/secure-url/{content_id}/{media_type}",
            get(get_secure_url),
        )
        .route(
            "/media/refresh-media-token/{content_id}/{media_type}",
            post(refresh_media_token),
        )
        .route("/media/secure-media/video", get(stream_video))
        .route("/media/secure-media/document", get(serve_document))
        .route("/media/embed", get(embed_video))
        .route("/admin/media/revoke", post(revoke_token))
}

fn media_link(path: &str, token: &str, content_id: i32) -> String {
    format!("{}?token={}&contentId={}", path, token, content_id)
}

/// Mint a token for `capability` on `content` and build the URL that redeems
/// it. `None` when the item has nothing in that slot.
pub(crate) fn secure_url(
    state: &AppState,
    user_id: i32,
    content: &content_item::Model,
    capability: Capability,
) -> Result<Option<SecureUrl>, ApiError> {
    let (source, media_type) = match capability {
        Capability::MediaVideo => (content.video_source(), "video"),
        Capability::MediaDocument => (content.document_source(), "document"),
    };
    let Some(source) = source else {
        return Ok(None);
    };

    let issued = state.media_tokens.issue(user_id, content.id, capability)?;
    let embedded = capability == Capability::MediaVideo && matches!(source, MediaSource::External(_));
    let path = match (capability, embedded) {
        (Capability::MediaVideo, true) => "/api/media/embed",
        (Capability::MediaVideo, false) => "/api/media/secure-media/video",
        (Capability::MediaDocument, _) => "/api/media/secure-media/document",
    };

    Ok(Some(SecureUrl {
        content_id: content.id,
        media_type: media_type.to_string(),
        url: state.config.public_url(&media_link(path, &issued.token, content.id)),
        token: issued.token,
        expires_at: issued.expires_at,
        embedded,
    }))
}

async fn mint(
    state: &AppState,
    user_id: i32,
    content_id: i32,
    media_type: &str,
) -> Result<SecureUrl, ApiError> {
    let capability = Capability::from_media_type(media_type).ok_or_else(|| {
        ApiError::Validation(format!(
            "Unknown media type '{}', expected 'video' or 'document'",
            media_type
        ))
    })?;

    let entitlement = state.entitlement.check(user_id, content_id).await?;
    let url = secure_url(state, user_id, &entitlement.content, capability)?
        .ok_or_else(|| ApiError::NotFound(format!("This content has no {}", media_type)))?;

    tracing::debug!(user_id, content_id, capability = %capability, "media token issued");
    Ok(url)
}

/// Redeem `query.token` for `capability` and re-check the holder's entitlement.
async fn redeem(
    state: &AppState,
    query: &MediaQuery,
    capability: Capability,
) -> Result<(MediaAccess, Entitlement), ApiError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing media token".to_string()))?;

    let access = state.media_tokens.validate(token, capability).await?;

    if let Some(raw) = query.content_id.as_deref().filter(|c| !c.is_empty()) {
        let requested: i32 = raw
            .parse()
            .map_err(|_| ApiError::Validation("contentId must be an integer".to_string()))?;
        if requested != access.resource {
            tracing::warn!(
                user_id = access.subject,
                token_resource = access.resource,
                requested,
                "media token presented for a different content item"
            );
            return Err(ApiError::Forbidden(
                "Token does not grant access to this content".to_string(),
            ));
        }
    }

    let entitlement = state
        .entitlement
        .check(access.subject, access.resource)
        .await?;
    Ok((access, entitlement))
}

/// Issue a short-lived URL for a content item's video or document.
#[utoipa::path(
    get,
    path = "/api/media/secure-url/{content_id}/{media_type}",
    params(
        ("content_id" = i32, Path, description = "Content item ID"),
        ("media_type" = String, Path, description = "`video` or `document`")
    ),
    responses(
        (status = 200, description = "Secure URL", body = ApiResponse<SecureUrl>),
        (status = 403, description = "Not enrolled or course inactive"),
        (status = 404, description = "No such media")
    ),
    security(("bearer_auth" = [])),
    tag = "media"
)]
async fn get_secure_url(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((content_id, media_type)): Path<(i32, String)>,
) -> Result<ApiResponse<SecureUrl>, ApiError> {
    Ok(ApiResponse::success(
        mint(&state, user_id, content_id, &media_type).await?,
    ))
}

/// Mint a fresh token before the current one expires.
#[utoipa::path(
    post,
    path = "/api/media/refresh-media-token/{content_id}/{media_type}",
    params(
        ("content_id" = i32, Path, description = "Content item ID"),
        ("media_type" = String, Path, description = "`video` or `document`")
    ),
    responses(
        (status = 200, description = "Fresh secure URL", body = ApiResponse<SecureUrl>),
        (status = 403, description = "Not enrolled or course inactive")
    ),
    security(("bearer_auth" = [])),
    tag = "media"
)]
async fn refresh_media_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((content_id, media_type)): Path<(i32, String)>,
) -> Result<ApiResponse<SecureUrl>, ApiError> {
    let url = mint(&state, user_id, content_id, &media_type).await?;
    Ok(ApiResponse::with_message(url, "Media token refreshed"))
}

/// Stream an uploaded video (range requests supported) or send the client to
/// the wrapper page of an external one.
#[utoipa::path(
    get,
    path = "/api/media/secure-media/video",
    params(MediaQuery),
    responses(
        (status = 200, description = "Full video"),
        (status = 206, description = "Partial content"),
        (status = 303, description = "External video, see embed page"),
        (status = 401, description = "Token missing, expired, revoked or invalid"),
        (status = 403, description = "Token for another item, or entitlement lost"),
        (status = 416, description = "Range not satisfiable")
    ),
    tag = "media"
)]
async fn stream_video(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (access, entitlement) = redeem(&state, &query, Capability::MediaVideo).await?;

    match entitlement.content.video_source() {
        Some(MediaSource::Uploaded(file)) => {
            state
                .media
                .video(&file, headers.get(header::RANGE))
                .await
        }
        Some(MediaSource::External(_)) => {
            let token = query.token.unwrap_or_default();
            let target = media_link("/api/media/embed", &token, access.resource);
            Ok(protected_redirect(&target))
        }
        None => Err(ApiError::NotFound("This content has no video".to_string())),
    }
}

/// Serve a document. Spreadsheets are sent as attachments.
#[utoipa::path(
    get,
    path = "/api/media/secure-media/document",
    params(MediaQuery),
    responses(
        (status = 200, description = "Document bytes"),
        (status = 303, description = "Externally hosted document"),
        (status = 401, description = "Token missing, expired, revoked or invalid"),
        (status = 403, description = "Entitlement lost")
    ),
    tag = "media"
)]
async fn serve_document(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ApiError> {
    let (_, entitlement) = redeem(&state, &query, Capability::MediaDocument).await?;

    match entitlement.content.document_source() {
        Some(MediaSource::Uploaded(file)) => state.media.document(&file).await,
        Some(MediaSource::External(url)) => Ok(protected_redirect(&url)),
        None => Err(ApiError::NotFound("This content has no document".to_string())),
    }
}

/// Locked-down wrapper page around an externally hosted video player.
#[utoipa::path(
    get,
    path = "/api/media/embed",
    params(MediaQuery),
    responses(
        (status = 200, description = "HTML wrapper page", content_type = "text/html"),
        (status = 401, description = "Token missing, expired, revoked or invalid"),
        (status = 403, description = "Host not allowed or entitlement lost")
    ),
    tag = "media"
)]
async fn embed_video(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ApiError> {
    let (access, entitlement) = redeem(&state, &query, Capability::MediaVideo).await?;

    match entitlement.content.video_source() {
        Some(MediaSource::External(url)) => {
            state
                .media
                .embed_page(&url, access.resource, access.subject)
        }
        Some(MediaSource::Uploaded(_)) => Err(ApiError::NotFound(
            "This video is not externally hosted".to_string(),
        )),
        None => Err(ApiError::NotFound("This content has no video".to_string())),
    }
}

/// Invalidate a media token before it expires.
#[utoipa::path(
    post,
    path = "/api/admin/media/revoke",
    request_body = RevokeRequest,
    responses((status = 200, description = "Token revoked", body = ApiResponse<RevokeResponse>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn revoke_token(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<RevokeRequest>,
) -> Result<ApiResponse<RevokeResponse>, ApiError> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation("Token is required".to_string()));
    }
    let registry = state.media_tokens.registry();
    registry.revoke(token).await?;
    tracing::info!(admin_id = admin.id, "media token revoked by admin");

    Ok(ApiResponse::success(RevokeResponse {
        revoked: true,
        retention_secs: registry.retention().as_secs(),
    }))
}

fn protected_redirect(target: &str) -> Response {
    let mut res = Redirect::to(target).into_response();
    protect(res.headers_mut());
    res
}
