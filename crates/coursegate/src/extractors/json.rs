use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body extractor whose rejections use the API error format.
///
/// ```rust,ignore
/// async fn create_course(Json(payload): Json<CreateCourse>) -> impl IntoResponse {
///     // payload is deserialized from request body
/// }
/// ```
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        Ok(Json(value))
    }
}

/// [`Json`] followed by `validator` rules.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(|errors| {
            let fields: Vec<String> = errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| {
                    let reason = errs
                        .first()
                        .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                        .unwrap_or_else(|| "is invalid".to_string());
                    format!("{} {}", field, reason)
                })
                .collect();
            ApiError::Validation(fields.join("; "))
        })?;
        Ok(ValidatedJson(value))
    }
}
