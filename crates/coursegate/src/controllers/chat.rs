use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tokio_stream::Stream;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::ApiError;
use crate::extractors::{AdminUser, CurrentUser, Pagination, ValidatedJson};
use crate::integrations::realtime::{user_room, RealtimeEvent, ADMIN_ROOM};
use crate::models::chat_message::{self, ChatMessageResponse};
use crate::models::user::{self, Role};
use crate::response::{ApiResponse, Created};

use super::AppState;

pub const NEW_MESSAGE_EVENT: &str = "chat:new_message";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "must be 1 to 2000 characters"))]
    pub body: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChatQuery {
    /// Conversation to open; omitted lists the latest messages of everyone
    pub user_id: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/messages", post(send_message).get(my_conversation))
        .route("/chat/stream", get(user_stream))
        .route("/admin/chat/messages", get(admin_messages))
        .route("/admin/chat/messages/{user_id}", post(admin_reply))
        .route("/admin/realtime", get(admin_stream))
}

async fn store(
    state: &AppState,
    conversation: i32,
    sender: &user::Model,
    role: Role,
    body: &str,
) -> Result<ChatMessageResponse, ApiError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::Validation("Message cannot be empty".to_string()));
    }
    let saved = chat_message::ActiveModel {
        user_id: Set(conversation),
        sender_id: Set(sender.id),
        sender_role: Set(role.as_str().to_string()),
        body: Set(body.to_string()),
        is_read: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok(saved.into())
}

fn event_payload(message: &ChatMessageResponse) -> serde_json::Value {
    serde_json::to_value(message).unwrap_or(serde_json::Value::Null)
}

/// Mark messages in `conversation` written by the other side as read.
async fn mark_read(state: &AppState, conversation: i32, written_by: Role) -> Result<(), ApiError> {
    chat_message::Entity::update_many()
        .col_expr(chat_message::Column::IsRead, Expr::value(true))
        .filter(chat_message::Column::UserId.eq(conversation))
        .filter(chat_message::Column::SenderRole.eq(written_by.as_str()))
        .filter(chat_message::Column::IsRead.eq(false))
        .exec(&state.db)
        .await?;
    Ok(())
}

async fn conversation(state: &AppState, user_id: i32) -> Result<Vec<ChatMessageResponse>, ApiError> {
    Ok(chat_message::Entity::find()
        .filter(chat_message::Column::UserId.eq(user_id))
        .order_by_asc(chat_message::Column::CreatedAt)
        .order_by_asc(chat_message::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(ChatMessageResponse::from)
        .collect())
}

/// Send a message to the admin team.
#[utoipa::path(
    post,
    path = "/api/chat/messages",
    request_body = SendMessageRequest,
    responses((status = 201, description = "Message stored", body = ApiResponse<ChatMessageResponse>)),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(payload): ValidatedJson<SendMessageRequest>,
) -> Result<Created<ChatMessageResponse>, ApiError> {
    let message = store(&state, user.id, &user, Role::User, &payload.body).await?;
    state
        .realtime
        .emit(ADMIN_ROOM, NEW_MESSAGE_EVENT, event_payload(&message))
        .await;
    Ok(Created(ApiResponse::success(message)))
}

/// The caller's conversation with the admin team, oldest first.
#[utoipa::path(
    get,
    path = "/api/chat/messages",
    responses((status = 200, description = "Conversation", body = ApiResponse<Vec<ChatMessageResponse>>)),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
async fn my_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Vec<ChatMessageResponse>>, ApiError> {
    mark_read(&state, user.id, Role::Admin).await?;
    Ok(ApiResponse::success(conversation(&state, user.id).await?))
}

/// One conversation when `user_id` is given, else the latest messages overall.
#[utoipa::path(
    get,
    path = "/api/admin/chat/messages",
    params(ChatQuery, Pagination),
    responses((status = 200, description = "Messages", body = ApiResponse<Vec<ChatMessageResponse>>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn admin_messages(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ChatQuery>,
    pagination: Pagination,
) -> Result<ApiResponse<Vec<ChatMessageResponse>>, ApiError> {
    if let Some(user_id) = query.user_id {
        mark_read(&state, user_id, Role::User).await?;
        return Ok(ApiResponse::success(conversation(&state, user_id).await?));
    }

    let latest = chat_message::Entity::find()
        .order_by_desc(chat_message::Column::CreatedAt)
        .order_by_desc(chat_message::Column::Id)
        .offset(pagination.offset)
        .limit(pagination.limit)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::success(
        latest.into_iter().map(ChatMessageResponse::from).collect(),
    ))
}

/// Reply to a learner.
#[utoipa::path(
    post,
    path = "/api/admin/chat/messages/{user_id}",
    params(("user_id" = i32, Path, description = "Learner whose conversation to answer")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Reply stored", body = ApiResponse<ChatMessageResponse>),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn admin_reply(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<SendMessageRequest>,
) -> Result<Created<ChatMessageResponse>, ApiError> {
    user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let message = store(&state, user_id, &admin, Role::Admin, &payload.body).await?;
    let data = event_payload(&message);
    state
        .realtime
        .emit(&user_room(user_id), NEW_MESSAGE_EVENT, data.clone())
        .await;
    // Other admins see the reply too.
    state.realtime.emit(ADMIN_ROOM, NEW_MESSAGE_EVENT, data).await;
    Ok(Created(ApiResponse::success(message)))
}

fn event_stream(
    rx: tokio::sync::broadcast::Receiver<RealtimeEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|item| {
        let ev = match item {
            Ok(ev) => ev,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "realtime subscriber lagged; events dropped");
                return None;
            }
        };
        Event::default()
            .event(&ev.event)
            .json_data(&ev.payload)
            .ok()
            .map(Ok)
    })
}

/// Server-sent events for the admin room.
#[utoipa::path(
    get,
    path = "/api/admin/realtime",
    responses((status = 200, description = "Event stream", content_type = "text/event-stream")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
async fn admin_stream(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(admin_id = admin.id, "admin joined realtime room");
    let rx = state.realtime.join(ADMIN_ROOM).await;
    Sse::new(event_stream(rx)).keep_alive(KeepAlive::default())
}

/// Server-sent events for the caller's own room (admin replies).
#[utoipa::path(
    get,
    path = "/api/chat/stream",
    responses((status = 200, description = "Event stream", content_type = "text/event-stream")),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
async fn user_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.realtime.join(&user_room(user.id)).await;
    Sse::new(event_stream(rx)).keep_alive(KeepAlive::default())
}
