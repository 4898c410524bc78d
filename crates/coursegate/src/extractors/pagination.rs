use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use utoipa::IntoParams;

/// `?limit=&offset=` query parameters. Malformed values fall back to defaults.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct Pagination {
    /// Number of items to return (default: 50, max: 200)
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Number of items to skip (default: 0)
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn clamped(&self) -> Self {
        Pagination {
            limit: self.limit.clamp(1, 200),
            offset: self.offset,
        }
    }
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pagination = Query::<Pagination>::from_request_parts(parts, state)
            .await
            .map(|Query(p)| p)
            .unwrap_or_default();
        Ok(pagination.clamped())
    }
}
