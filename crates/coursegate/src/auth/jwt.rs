use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;

/// Session JWT claims payload.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i32, ApiError> {
        self.sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".to_string()))
    }
}

/// Create a session JWT for a given user ID.
pub fn create_token(user_id: i32, secret: &str, expiry_hours: u64) -> Result<String, ApiError> {
    let now = Utc::now();
    let expires = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to create token: {}", e)))
}

/// Validate a session JWT and return the claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::Unauthorized(format!("Invalid session token: {}", e)))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_validate() {
        let token = create_token(42, "secret", 1).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = create_token(1, "right", 1).unwrap();
        assert!(matches!(
            validate_token(&token, "wrong"),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
