use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User entity - learners and administrators.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    #[sea_orm(unique)]
    pub username: String,

    /// Password hash (excluded from serialization via serde skip)
    #[serde(skip_serializing)]
    #[schema(read_only)]
    pub password_hash: String,

    pub name: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,

    /// "user" or "admin"
    pub role: String,

    /// "local", "google" or "import"
    pub auth_provider: String,

    pub is_active: bool,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Unknown role strings are treated as the least privileged role.
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl Model {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

/// Public user data (safe to return in API responses).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<Model> for UserResponse {
    fn from(user: Model) -> Self {
        UserResponse {
            role: user.role(),
            id: user.id,
            email: user.email,
            username: user.username,
            name: user.name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_are_plain_users() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("superuser"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
    }
}
