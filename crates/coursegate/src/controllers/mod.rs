use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;

use crate::auth::MediaTokens;
use crate::cache::CacheService;
use crate::config::Config;
use crate::entitlement::EntitlementChecker;
use crate::import::BulkImporter;
use crate::integrations::{EmailSender, IdentityProvider, PaymentGateway, RealtimeHub};
use crate::media::MediaResponder;
use crate::storage::LocalStorage;

pub mod auth;
pub mod chat;
pub mod contents;
pub mod coupons;
pub mod courses;
pub mod enrollments;
pub mod import;
pub mod media;
pub mod progress;

/// Shared application state available in all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub cache: CacheService,
    pub media_tokens: MediaTokens,
    pub entitlement: EntitlementChecker,
    pub storage: LocalStorage,
    pub media: MediaResponder,
    pub importer: BulkImporter,
    pub email: Arc<dyn EmailSender>,
    pub payments: Arc<dyn PaymentGateway>,
    pub identity: Arc<dyn IdentityProvider>,
    pub realtime: RealtimeHub,
}

/// Every API route, relative to `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .merge(courses::routes())
        .merge(contents::routes())
        .merge(media::routes())
        .merge(enrollments::routes())
        .merge(coupons::routes())
        .merge(progress::routes())
        .merge(chat::routes())
        .merge(import::routes())
}
