//! JSON extractor that runs `validator` rules before the handler sees the value.

use crate::errors::AppError;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that passed [`Validate`].
///
/// Malformed JSON becomes [`AppError::JsonExtractorRejection`]; rule
/// violations become [`AppError::ValidationError`] with per-field details.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct StockChange {
///     #[validate(range(min = 1))]
///     quantity: i64,
/// }
///
/// async fn add_stock(ValidatedJson(body): ValidatedJson<StockChange>) { /* ... */ }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await?;
        data.validate()?;
        Ok(ValidatedJson(data))
    }
}
