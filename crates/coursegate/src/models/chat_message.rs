use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Live chat message. Each learner has a single conversation with the
/// admin team, keyed by `user_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Conversation owner (the learner)
    pub user_id: i32,

    /// Author of this message
    pub sender_id: i32,

    /// "user" or "admin"
    pub sender_role: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    pub is_read: bool,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: i32,
    pub user_id: i32,
    pub sender_id: i32,
    pub sender_role: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Model> for ChatMessageResponse {
    fn from(m: Model) -> Self {
        ChatMessageResponse {
            id: m.id,
            user_id: m.user_id,
            sender_id: m.sender_id,
            sender_role: m.sender_role,
            body: m.body,
            is_read: m.is_read,
            created_at: m.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}
