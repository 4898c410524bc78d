use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://coursegate.db, postgres://...)
    pub database_url: String,

    /// Session JWT signing secret
    pub jwt_secret: String,

    /// Session JWT expiry in hours (default: 24)
    pub jwt_expiry_hours: u64,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 3000)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,

    /// Redis URL for the shared cache / revocation registry (optional)
    pub redis_url: Option<String>,

    /// Upload directory for course media (default: ./uploads)
    pub upload_dir: String,

    /// Max upload file size in bytes (default: 500MB)
    pub max_upload_size: u64,

    /// Externally visible base URL used when building secure media links.
    /// Empty means links are returned relative to the server root.
    pub public_base_url: String,

    pub media: MediaConfig,

    pub integrations: IntegrationsConfig,
}

/// Media token and streaming settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Secret used to sign media access tokens. Distinct from the session secret.
    pub token_secret: String,

    /// Lifetime of `media-video` tokens in seconds (default: 1 hour)
    pub video_token_ttl_secs: u64,

    /// Lifetime of `media-document` tokens in seconds (default: 2 hours)
    pub document_token_ttl_secs: u64,

    /// How long a revocation entry is retained. Never shorter than the longest TTL.
    pub revocation_retention_secs: u64,

    /// Origins the external video embed wrapper may load frames and scripts from.
    pub embed_allowed_origins: Vec<String>,
}

impl MediaConfig {
    pub fn video_ttl(&self) -> Duration {
        Duration::from_secs(self.video_token_ttl_secs)
    }

    pub fn document_ttl(&self) -> Duration {
        Duration::from_secs(self.document_token_ttl_secs)
    }

    pub fn revocation_retention(&self) -> Duration {
        let longest = self.video_token_ttl_secs.max(self.document_token_ttl_secs);
        Duration::from_secs(self.revocation_retention_secs.max(longest))
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig {
            token_secret: String::new(),
            video_token_ttl_secs: 3600,
            document_token_ttl_secs: 7200,
            revocation_retention_secs: 7200,
            embed_allowed_origins: default_embed_origins(),
        }
    }
}

/// Endpoints and credentials for the third-party collaborators.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Payment gateway API base URL (e.g. https://api.razorpay.com/v1)
    pub payment_api_url: Option<String>,
    pub payment_key_id: Option<String>,
    pub payment_key_secret: Option<String>,
    /// ISO currency code sent with payment orders (default: INR)
    pub payment_currency: String,

    /// Transactional email HTTP API endpoint
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_sender: String,

    /// OAuth client used for "sign in with Google"
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_uri: Option<String>,
    pub oauth_token_url: String,
    pub oauth_tokeninfo_url: String,
}

fn default_embed_origins() -> Vec<String> {
    vec![
        "https://www.youtube.com".to_string(),
        "https://www.youtube-nocookie.com".to_string(),
        "https://player.vimeo.com".to_string(),
    ]
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Error raised when the process cannot start with the current environment.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

impl Config {
    /// Load configuration from environment variables (with .env support).
    ///
    /// A missing `MEDIA_TOKEN_SECRET` is fatal outside development and test.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let environment = env_or("ENVIRONMENT", "development");
        let lenient = environment == "development" || environment == "test";

        let token_secret = match std::env::var("MEDIA_TOKEN_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if lenient => {
                tracing::warn!("MEDIA_TOKEN_SECRET is not set; using an insecure development secret");
                "coursegate-dev-media-secret-change-me".to_string()
            }
            _ => {
                return Err(ConfigError(
                    "MEDIA_TOKEN_SECRET must be set to sign media access tokens".to_string(),
                ))
            }
        };

        let video_token_ttl_secs = env_parse("VIDEO_TOKEN_TTL_SECS", 3600);
        let document_token_ttl_secs = env_parse("DOCUMENT_TOKEN_TTL_SECS", 7200);
        let revocation_retention_secs = env_parse(
            "REVOCATION_RETENTION_SECS",
            video_token_ttl_secs.max(document_token_ttl_secs),
        );

        let embed_allowed_origins = match std::env::var("EMBED_ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            Err(_) => default_embed_origins(),
        };

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://coursegate.db?mode=rwc"),
            jwt_secret: env_or("JWT_SECRET", "coursegate-dev-secret-change-me"),
            jwt_expiry_hours: env_parse("JWT_EXPIRY_HOURS", 24),
            server_host: env_or("SERVER_HOST", "127.0.0.1"),
            server_port: env_parse("SERVER_PORT", 3000),
            environment,
            redis_url: std::env::var("REDIS_URL").ok(),
            upload_dir: env_or("UPLOAD_DIR", "./uploads"),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE", 524_288_000), // 500MB
            public_base_url: env_or("PUBLIC_BASE_URL", "")
                .trim_end_matches('/')
                .to_string(),
            media: MediaConfig {
                token_secret,
                video_token_ttl_secs,
                document_token_ttl_secs,
                revocation_retention_secs,
                embed_allowed_origins,
            },
            integrations: IntegrationsConfig {
                payment_api_url: std::env::var("PAYMENT_API_URL").ok(),
                payment_key_id: std::env::var("PAYMENT_KEY_ID").ok(),
                payment_key_secret: std::env::var("PAYMENT_KEY_SECRET").ok(),
                payment_currency: env_or("PAYMENT_CURRENCY", "INR"),
                email_api_url: std::env::var("EMAIL_API_URL").ok(),
                email_api_key: std::env::var("EMAIL_API_KEY").ok(),
                email_sender: env_or("EMAIL_SENDER", "no-reply@coursegate.local"),
                oauth_client_id: std::env::var("OAUTH_CLIENT_ID").ok(),
                oauth_client_secret: std::env::var("OAUTH_CLIENT_SECRET").ok(),
                oauth_redirect_uri: std::env::var("OAUTH_REDIRECT_URI").ok(),
                oauth_token_url: env_or("OAUTH_TOKEN_URL", "https://oauth2.googleapis.com/token"),
                oauth_tokeninfo_url: env_or(
                    "OAUTH_TOKENINFO_URL",
                    "https://oauth2.googleapis.com/tokeninfo",
                ),
            },
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Prefix a server-relative path with the public base URL.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.public_base_url, path)
    }
}
