pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod db;
pub mod entitlement;
pub mod error;
pub mod extractors;
pub mod import;
pub mod integrations;
pub mod logging;
pub mod media;
pub mod migrations;
pub mod models;
pub mod openapi;
pub mod response;
pub mod services;
pub mod storage;
pub mod testing;

pub use app::App;
pub use cache::CacheService;
pub use config::Config;
pub use error::ApiError;
pub use logging::{init_logging, init_logging_json};
pub use response::ApiResponse;
pub use testing::{TestApp, TestResponse};
