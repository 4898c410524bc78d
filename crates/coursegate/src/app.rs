use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::{MediaTokens, RevocationRegistry};
use crate::cache::CacheService;
use crate::config::Config;
use crate::controllers::{self, AppState};
use crate::entitlement::EntitlementChecker;
use crate::error::{expose_errors, ApiError, ErrorExposure};
use crate::import::{BulkImporter, LabelTable};
use crate::integrations::{email, identity, payment};
use crate::integrations::{EmailSender, IdentityProvider, PaymentGateway, RealtimeHub};
use crate::media::MediaResponder;
use crate::migrations::Migrator;
use crate::openapi::ApiDoc;
use crate::storage::LocalStorage;

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// The coursegate application: configuration, database and every shared
/// service handlers need.
pub struct App {
    pub config: Config,
    pub db: DatabaseConnection,
    pub cache: CacheService,
    state: AppState,
    errors: ErrorExposure,
    api_docs_path: String,
}

impl App {
    /// Create the application from environment configuration.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    /// Create the application with a given config.
    ///
    /// Connects to the database and applies pending migrations. Collaborators
    /// are built from `config.integrations`; replace them with the `with_*`
    /// builders.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let db = crate::db::connect(&config).await?;

        tracing::info!("Running pending database migrations...");
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations complete.");

        let cache = Self::init_cache(&config).await?;

        let storage = LocalStorage::new(&config.upload_dir);
        storage.ensure_dir().await?;

        let registry = RevocationRegistry::new(cache.clone(), config.media.revocation_retention());
        let labels = LabelTable::from_env();
        tracing::debug!(labels = labels.len(), "import label table loaded");

        let state = AppState {
            db: db.clone(),
            config: Arc::new(config.clone()),
            cache: cache.clone(),
            media_tokens: MediaTokens::new(&config.media, registry),
            entitlement: EntitlementChecker::new(db.clone()),
            media: MediaResponder::new(storage.clone(), config.media.embed_allowed_origins.clone()),
            storage,
            importer: BulkImporter::new(db.clone(), labels),
            email: email::from_config(&config.integrations),
            payments: payment::from_config(&config.integrations),
            identity: identity::from_config(&config.integrations),
            realtime: RealtimeHub::new(),
        };

        Ok(App {
            errors: ErrorExposure::for_config(&config),
            config,
            db,
            cache,
            state,
            api_docs_path: "/api-docs".to_string(),
        })
    }

    /// Initialize the cache backend based on config.
    ///
    /// A configured Redis that cannot be reached fails startup.
    async fn init_cache(config: &Config) -> Result<CacheService, ApiError> {
        #[cfg(feature = "redis")]
        if let Some(ref redis_url) = config.redis_url {
            let redis_cache = crate::cache::RedisCache::new(redis_url).await.map_err(|e| {
                tracing::error!("Redis connection failed: {}", e);
                e
            })?;
            tracing::info!("Redis cache connected");
            return Ok(CacheService::new(redis_cache));
        }
        #[cfg(not(feature = "redis"))]
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the redis feature is disabled");
        }
        tracing::info!("Using in-memory cache");
        Ok(CacheService::in_memory())
    }

    /// Replace the transactional email sender.
    pub fn with_email(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.state.email = sender;
        self
    }

    /// Replace the payment gateway.
    pub fn with_payments(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.state.payments = gateway;
        self
    }

    /// Replace the OAuth identity provider.
    pub fn with_identity(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.state.identity = provider;
        self
    }

    /// Customize the URL path where API docs are served.
    ///
    /// Default: `/api-docs` (Scalar UI) and `/api-docs/openapi.json` (raw spec).
    pub fn api_docs_url(mut self, path: &str) -> Self {
        self.api_docs_path = path.trim_end_matches('/').to_string();
        self
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router: every API route under `/api`, the health check and
    /// the API docs.
    pub fn router(&self) -> Router {
        let openapi = ApiDoc::openapi();
        let json_path = format!("{}/openapi.json", self.api_docs_path);
        let x_request_id = axum::http::HeaderName::from_static("x-request-id");
        // Multipart uploads are bounded by the configured size, not axum's 2MB default.
        let body_limit = usize::try_from(self.config.max_upload_size).unwrap_or(usize::MAX);

        Router::new()
            .route("/health", get(health))
            .nest("/api", controllers::routes())
            .with_state(self.state.clone())
            .merge(Scalar::with_url(self.api_docs_path.clone(), openapi.clone()))
            .route(
                &json_path,
                get(move || {
                    let spec = openapi.clone();
                    async move { Json(spec) }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(self.errors, expose_errors))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(CorsLayer::permissive())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                    .on_request(DefaultOnRequest::new().level(tracing::Level::DEBUG))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(tracing::Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    /// Run the application server until Ctrl+C.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let router = self.router();
        let purger = self.cache.spawn_purger(CACHE_PURGE_INTERVAL);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(
            environment = %self.config.environment,
            docs = %self.api_docs_path,
            "coursegate listening on http://{}",
            addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        purger.abort();
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down coursegate...");
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
