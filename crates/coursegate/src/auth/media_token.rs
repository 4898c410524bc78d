//! Short-lived signed capability tokens for media streaming.
//!
//! A token binds `(subject, resource, capability)` plus a random nonce and an
//! expiry, signed with HS256. Tokens are never stored; the only server-side
//! state is the [`RevocationRegistry`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::revocation::RevocationRegistry;
use crate::config::MediaConfig;
use crate::error::ApiError;

/// The action a media token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Capability {
    #[serde(rename = "media-video")]
    MediaVideo,
    #[serde(rename = "media-document")]
    MediaDocument,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::MediaVideo => "media-video",
            Capability::MediaDocument => "media-document",
        }
    }

    /// Parse the `{media_type}` path segment used by the URL endpoints.
    pub fn from_media_type(media_type: &str) -> Option<Capability> {
        match media_type {
            "video" => Some(Capability::MediaVideo),
            "document" => Some(Capability::MediaDocument),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MediaTokenError {
    #[error("Expired")]
    Expired,
    #[error("BadSignature")]
    BadSignature,
    #[error("WrongCapability")]
    WrongCapability,
    #[error("Revoked")]
    Revoked,
}

impl From<MediaTokenError> for ApiError {
    fn from(e: MediaTokenError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaClaims {
    sub: String,
    rid: String,
    cap: Capability,
    jti: String,
    iat: i64,
    exp: i64,
}

/// Decoded, verified token contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaAccess {
    pub subject: i32,
    pub resource: i32,
    pub capability: Capability,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates media tokens. One instance is built at startup and
/// shared through `AppState`.
#[derive(Clone)]
pub struct MediaTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    video_ttl: Duration,
    document_ttl: Duration,
    registry: RevocationRegistry,
}

impl MediaTokens {
    pub fn new(config: &MediaConfig, registry: RevocationRegistry) -> Self {
        MediaTokens {
            encoding: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.token_secret.as_bytes()),
            video_ttl: config.video_ttl(),
            document_ttl: config.document_ttl(),
            registry,
        }
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    pub fn default_ttl(&self, capability: Capability) -> Duration {
        match capability {
            Capability::MediaVideo => self.video_ttl,
            Capability::MediaDocument => self.document_ttl,
        }
    }

    /// Issue a token with the default TTL for `capability`.
    pub fn issue(
        &self,
        subject: i32,
        resource: i32,
        capability: Capability,
    ) -> Result<IssuedToken, ApiError> {
        self.issue_with_ttl(subject, resource, capability, self.default_ttl(capability))
    }

    pub fn issue_with_ttl(
        &self,
        subject: i32,
        resource: i32,
        capability: Capability,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        self.issue_at(subject, resource, capability, Utc::now(), ttl)
    }

    /// Issue a token as if minted at `issued_at`.
    pub fn issue_at(
        &self,
        subject: i32,
        resource: i32,
        capability: Capability,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ApiError::Internal(format!("Invalid token TTL: {}", e)))?;
        let expires_at = issued_at + ttl;

        let claims = MediaClaims {
            sub: subject.to_string(),
            rid: resource.to_string(),
            cap: capability,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to sign media token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify `token` for `expected` capability.
    ///
    /// Order: revocation registry, signature (expiry enforced by the JWT
    /// library with zero leeway), then capability.
    pub async fn validate(
        &self,
        token: &str,
        expected: Capability,
    ) -> Result<MediaAccess, ApiError> {
        if self.registry.is_revoked(token).await? {
            return Err(MediaTokenError::Revoked.into());
        }
        Ok(self.verify(token, expected)?)
    }

    fn verify(&self, token: &str, expected: Capability) -> Result<MediaAccess, MediaTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<MediaClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => MediaTokenError::Expired,
                _ => MediaTokenError::BadSignature,
            }
        })?;
        let claims = data.claims;

        if claims.cap != expected {
            return Err(MediaTokenError::WrongCapability);
        }

        let subject = claims
            .sub
            .parse()
            .map_err(|_| MediaTokenError::BadSignature)?;
        let resource = claims
            .rid
            .parse()
            .map_err(|_| MediaTokenError::BadSignature)?;

        Ok(MediaAccess {
            subject,
            resource,
            capability: claims.cap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheService;

    fn tokens_with_secret(secret: &str) -> MediaTokens {
        let config = MediaConfig {
            token_secret: secret.to_string(),
            ..MediaConfig::default()
        };
        let registry =
            RevocationRegistry::new(CacheService::in_memory(), config.revocation_retention());
        MediaTokens::new(&config, registry)
    }

    fn unauthorized_message(err: ApiError) -> String {
        match err {
            ApiError::Unauthorized(msg) => msg,
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fresh_token_validates() {
        let tokens = tokens_with_secret("s3cret");
        let issued = tokens.issue(7, 99, Capability::MediaVideo).unwrap();
        let access = tokens
            .validate(&issued.token, Capability::MediaVideo)
            .await
            .unwrap();
        assert_eq!(
            access,
            MediaAccess {
                subject: 7,
                resource: 99,
                capability: Capability::MediaVideo
            }
        );
    }

    #[tokio::test]
    async fn default_ttls_per_capability() {
        let tokens = tokens_with_secret("s3cret");
        let before = Utc::now();
        let video = tokens.issue(1, 1, Capability::MediaVideo).unwrap();
        let doc = tokens.issue(1, 1, Capability::MediaDocument).unwrap();
        let video_secs = (video.expires_at - before).num_seconds();
        let doc_secs = (doc.expires_at - before).num_seconds();
        assert!((3599..=3601).contains(&video_secs));
        assert!((7199..=7201).contains(&doc_secs));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let tokens = tokens_with_secret("s3cret");
        let issued = tokens
            .issue_at(
                1,
                2,
                Capability::MediaVideo,
                Utc::now() - chrono::Duration::hours(2),
                Duration::from_secs(3600),
            )
            .unwrap();
        let err = tokens
            .validate(&issued.token, Capability::MediaVideo)
            .await
            .unwrap_err();
        assert_eq!(unauthorized_message(err), "Expired");
    }

    #[tokio::test]
    async fn wrong_capability_is_rejected() {
        let tokens = tokens_with_secret("s3cret");
        let issued = tokens.issue(1, 2, Capability::MediaDocument).unwrap();
        let err = tokens
            .validate(&issued.token, Capability::MediaVideo)
            .await
            .unwrap_err();
        assert_eq!(unauthorized_message(err), "WrongCapability");
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let ours = tokens_with_secret("ours");
        let theirs = tokens_with_secret("theirs");
        let issued = theirs.issue(1, 2, Capability::MediaVideo).unwrap();
        let err = ours
            .validate(&issued.token, Capability::MediaVideo)
            .await
            .unwrap_err();
        assert_eq!(unauthorized_message(err), "BadSignature");

        let err = ours
            .validate("not-a-token", Capability::MediaVideo)
            .await
            .unwrap_err();
        assert_eq!(unauthorized_message(err), "BadSignature");
    }

    #[tokio::test]
    async fn revoked_token_fails_before_expiry() {
        let tokens = tokens_with_secret("s3cret");
        let issued = tokens.issue(1, 2, Capability::MediaVideo).unwrap();
        tokens.registry().revoke(&issued.token).await.unwrap();
        let err = tokens
            .validate(&issued.token, Capability::MediaVideo)
            .await
            .unwrap_err();
        assert_eq!(unauthorized_message(err), "Revoked");
    }

    #[tokio::test]
    async fn issuances_never_collide() {
        let tokens = tokens_with_secret("s3cret");
        let a = tokens.issue(1, 2, Capability::MediaVideo).unwrap();
        let b = tokens.issue(1, 2, Capability::MediaVideo).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn media_type_segments() {
        assert_eq!(
            Capability::from_media_type("video"),
            Some(Capability::MediaVideo)
        );
        assert_eq!(
            Capability::from_media_type("document"),
            Some(Capability::MediaDocument)
        );
        assert_eq!(Capability::from_media_type("audio"), None);
    }
}
