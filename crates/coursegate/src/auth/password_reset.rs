use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::auth::codes::{generate_numeric_code, hash_token};
use crate::error::ApiError;
use crate::models::security_token;

const PASSWORD_RESET: &str = "password_reset";

/// How long an emailed reset code stays valid.
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Create a password-reset code. Returns the raw code to email to the user.
///
/// Older unused codes for the same user are invalidated.
pub async fn create_password_reset_code(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<String, ApiError> {
    security_token::Entity::update_many()
        .col_expr(security_token::Column::Used, Expr::value(true))
        .filter(security_token::Column::UserId.eq(user_id))
        .filter(security_token::Column::TokenType.eq(PASSWORD_RESET))
        .filter(security_token::Column::Used.eq(false))
        .exec(db)
        .await?;

    let raw_code = generate_numeric_code();
    let now = Utc::now().naive_utc();

    let model = security_token::ActiveModel {
        user_id: Set(user_id),
        token_hash: Set(hash_token(&raw_code)),
        token_type: Set(PASSWORD_RESET.to_string()),
        expires_at: Set(now + Duration::minutes(RESET_CODE_TTL_MINUTES)),
        used: Set(false),
        created_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await?;

    Ok(raw_code)
}

/// Validate and consume a password-reset code for `user_id`.
pub async fn consume_password_reset_code(
    db: &DatabaseConnection,
    user_id: i32,
    raw_code: &str,
) -> Result<(), ApiError> {
    let now = Utc::now().naive_utc();

    let token_model = security_token::Entity::find()
        .filter(security_token::Column::UserId.eq(user_id))
        .filter(security_token::Column::TokenHash.eq(hash_token(raw_code.trim())))
        .filter(security_token::Column::TokenType.eq(PASSWORD_RESET))
        .order_by_desc(security_token::Column::CreatedAt)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid or expired reset code".to_string()))?;

    if token_model.used {
        return Err(ApiError::Validation(
            "Reset code has already been used".to_string(),
        ));
    }

    if token_model.expires_at < now {
        return Err(ApiError::Validation("Reset code has expired".to_string()));
    }

    let mut active: security_token::ActiveModel = token_model.into();
    active.used = Set(true);
    active.update(db).await?;

    Ok(())
}
