use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-time code for password reset.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "security_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The user this code belongs to
    pub user_id: i32,

    /// SHA-256 of the code; the raw code only ever travels by email
    pub token_hash: String,

    /// Token purpose: "password_reset"
    pub token_type: String,

    pub expires_at: NaiveDateTime,

    #[sea_orm(default_value = false)]
    pub used: bool,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
