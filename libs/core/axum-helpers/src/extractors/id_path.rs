//! Numeric id path parameter.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

/// Positive integer id taken from the single path parameter.
///
/// Anything else (not a number, zero, negative) is a 400 with the JSON error body.
///
/// ```ignore
/// async fn get_product(IdPath(id): IdPath) -> String {
///     format!("Product {id}")
/// }
///
/// let app = Router::new().route("/products/{id}", get(get_product));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath(pub i64);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Ok(IdPath(id)),
            _ => Err(AppError::BadRequest(format!("Invalid id: {raw}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/items/{id}",
            get(|IdPath(id): IdPath| async move { id.to_string() }),
        )
    }

    async fn status(uri: &str) -> StatusCode {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_positive_id_is_accepted() {
        assert_eq!(status("/items/42").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_ids_are_rejected() {
        assert_eq!(status("/items/abc").await, StatusCode::BAD_REQUEST);
        assert_eq!(status("/items/0").await, StatusCode::BAD_REQUEST);
        assert_eq!(status("/items/-3").await, StatusCode::BAD_REQUEST);
    }
}
