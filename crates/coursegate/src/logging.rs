//! Tracing subscriber setup.
//!
//! The level is controlled by `RUST_LOG` and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=coursegate=debug,tower_http=debug,sqlx=warn coursegate serve
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human readable logs to stdout. Call once, before building the `App`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// JSON logs, one object per line, for log aggregation in production.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
