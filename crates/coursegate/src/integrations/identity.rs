use std::sync::Arc;

use serde::Deserialize;

use crate::config::IntegrationsConfig;
use crate::error::ApiError;

/// Identity asserted by the OAuth provider after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

/// OAuth collaborator: turn an authorization code into a verified identity.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<VerifiedIdentity, ApiError>;
}

/// Google-style OpenID provider. The ID token's signature and expiry are
/// checked by the provider's tokeninfo endpoint; the audience is checked here.
pub struct OAuthIdentityProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    tokeninfo_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

impl OAuthIdentityProvider {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        token_url: impl Into<String>,
        tokeninfo_url: impl Into<String>,
    ) -> Self {
        OAuthIdentityProvider {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_url: token_url.into(),
            tokeninfo_url: tokeninfo_url.into(),
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(
        res: reqwest::Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ApiError::Upstream(format!("{} read failed: {}", what, e)))?;
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), payload = %text, "{} rejected", what);
            return Err(ApiError::Unauthorized("Invalid authorization code".to_string()));
        }
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), payload = %text, "{} failed", what);
            return Err(ApiError::Upstream(format!("{} returned {}", what, status)));
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Upstream(format!("Invalid {} response: {}", what, e)))
    }
}

fn is_true(value: &Option<serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}

#[async_trait::async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<VerifiedIdentity, ApiError> {
        let res = self
            .client
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("OAuth token endpoint unreachable: {}", e)))?;
        let tokens: TokenResponse = Self::read(res, "OAuth token exchange").await?;

        let res = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", tokens.id_token.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("OAuth tokeninfo unreachable: {}", e)))?;
        let info: TokenInfo = Self::read(res, "OAuth token verification").await?;

        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "ID token issued for another client");
            return Err(ApiError::Unauthorized("Invalid identity token".to_string()));
        }
        let email = info
            .email
            .filter(|_| is_true(&info.email_verified))
            .ok_or_else(|| ApiError::Unauthorized("Email is not verified".to_string()))?;

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: email.to_lowercase(),
            name: info.name,
        })
    }
}

pub struct UnconfiguredIdentityProvider;

#[async_trait::async_trait]
impl IdentityProvider for UnconfiguredIdentityProvider {
    async fn exchange_code(&self, _code: &str) -> Result<VerifiedIdentity, ApiError> {
        Err(ApiError::Validation(
            "OAuth sign-in is not configured".to_string(),
        ))
    }
}

pub fn from_config(config: &IntegrationsConfig) -> Arc<dyn IdentityProvider> {
    match (
        &config.oauth_client_id,
        &config.oauth_client_secret,
        &config.oauth_redirect_uri,
    ) {
        (Some(id), Some(secret), Some(redirect)) => Arc::new(OAuthIdentityProvider::new(
            id,
            secret,
            redirect,
            &config.oauth_token_url,
            &config.oauth_tokeninfo_url,
        )),
        _ => Arc::new(UnconfiguredIdentityProvider),
    }
}
