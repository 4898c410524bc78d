use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::password_reset::{
    consume_password_reset_code, create_password_reset_code, RESET_CODE_TTL_MINUTES,
};
use crate::auth::{create_token, generate_temporary_password, hash_password, verify_password};
use crate::error::ApiError;
use crate::extractors::{CurrentUser, Json, ValidatedJson};
use crate::import::unique_username;
use crate::integrations::email::{self, send_in_background};
use crate::models::user::{self, Entity as User, Role, UserResponse};
use crate::response::{ApiResponse, Created};

use super::AppState;

// ── Request / Response types ──

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "must be 3 to 30 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleLoginRequest {
    /// Authorization code returned to the client by the provider
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequestPayload {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub code: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/google", post(google_login))
        .route("/password-reset/request", post(password_reset_request))
        .route("/password-reset/confirm", post(password_reset_confirm))
        .route("/me", get(me))
}

fn issue_session(state: &AppState, user: user::Model) -> Result<AuthResponse, ApiError> {
    let access_token = create_token(user.id, &state.config.jwt_secret, state.config.jwt_expiry_hours)?;
    Ok(AuthResponse {
        access_token,
        user: UserResponse::from(user),
    })
}

// ── Handlers ──

/// Sign up a new user.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists")
    ),
    tag = "auth"
)]
async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> Result<Created<AuthResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    let existing = User::find()
        .filter(
            user::Column::Email
                .eq(&email)
                .or(user::Column::Username.eq(&username)),
        )
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::Conflict(
            "User with this email or username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let now = Utc::now().naive_utc();

    let user_model = user::ActiveModel {
        email: Set(email),
        username: Set(username),
        password_hash: Set(password_hash),
        name: Set(payload.name.filter(|n| !n.trim().is_empty())),
        role: Set(Role::User.as_str().to_string()),
        auth_provider: Set("local".to_string()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(user_id = user_model.id, "user signed up");
    let display = user_model.name.clone().unwrap_or_else(|| user_model.username.clone());
    send_in_background(state.email.clone(), email::welcome(&user_model.email, &display));

    Ok(Created(ApiResponse::success(issue_session(&state, user_model)?)))
}

/// Log in with existing credentials.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user_model = User::find()
        .filter(user::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    if !user_model.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    if !verify_password(&payload.password, &user_model.password_hash)? {
        tracing::debug!(user_id = user_model.id, "login refused: bad password");
        return Err(invalid());
    }

    Ok(ApiResponse::success(issue_session(&state, user_model)?))
}

/// Sign in with the configured OAuth provider, creating the account on first use.
#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Code rejected or provider not configured"),
        (status = 502, description = "Provider unreachable")
    ),
    tag = "auth"
)]
async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    if payload.code.trim().is_empty() {
        return Err(ApiError::Validation("Authorization code is required".to_string()));
    }
    let identity = state.identity.exchange_code(payload.code.trim()).await?;

    let existing = User::find()
        .filter(user::Column::Email.eq(&identity.email))
        .one(&state.db)
        .await?;

    let user_model = match existing {
        Some(u) if !u.is_active => {
            return Err(ApiError::Unauthorized("Account is deactivated".to_string()))
        }
        Some(u) => u,
        None => {
            let now = Utc::now().naive_utc();
            let created = user::ActiveModel {
                email: Set(identity.email.clone()),
                username: Set(unique_username(&state.db, &identity.email).await?),
                password_hash: Set(hash_password(&generate_temporary_password())?),
                name: Set(identity.name.clone()),
                role: Set(Role::User.as_str().to_string()),
                auth_provider: Set("google".to_string()),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&state.db)
            .await?;
            tracing::info!(user_id = created.id, subject = %identity.subject, "account created from OAuth identity");
            let display = created.name.clone().unwrap_or_else(|| created.username.clone());
            send_in_background(state.email.clone(), email::welcome(&created.email, &display));
            created
        }
    };

    Ok(ApiResponse::success(issue_session(&state, user_model)?))
}

/// Request a password reset code by email.
///
/// Always answers 200 so the endpoint cannot be used to discover accounts.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/request",
    request_body = PasswordResetRequestPayload,
    responses(
        (status = 200, description = "Code sent when the account exists", body = ApiResponse<MessageResponse>)
    ),
    tag = "auth"
)]
async fn password_reset_request(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequestPayload>,
) -> Result<ApiResponse<MessageResponse>, ApiError> {
    let account = User::find()
        .filter(user::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .filter(|u| u.is_active);

    if let Some(u) = account {
        let code = create_password_reset_code(&state.db, u.id).await?;
        send_in_background(
            state.email.clone(),
            email::password_reset(&u.email, &code, RESET_CODE_TTL_MINUTES),
        );
        tracing::info!(user_id = u.id, "password reset code issued");
    }

    Ok(ApiResponse::success(MessageResponse {
        message: "If the account exists, a reset code has been sent".to_string(),
    }))
}

/// Set a new password with an emailed reset code.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "auth"
)]
async fn password_reset_confirm(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PasswordResetConfirm>,
) -> Result<ApiResponse<MessageResponse>, ApiError> {
    let invalid = || ApiError::Validation("Invalid or expired reset code".to_string());

    let account = User::find()
        .filter(user::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    consume_password_reset_code(&state.db, account.id, &payload.code).await?;

    let mut active: user::ActiveModel = account.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&state.db).await?;
    tracing::info!(user_id = updated.id, "password reset completed");

    Ok(ApiResponse::success(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

/// The signed-in user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
async fn me(CurrentUser(user): CurrentUser) -> ApiResponse<UserResponse> {
    ApiResponse::success(UserResponse::from(user))
}
