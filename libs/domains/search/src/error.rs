use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

use crate::index::IndexError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search parameters: {0}")]
    Validation(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type SearchResult<T> = Result<T, SearchError>;

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) => AppError::BadRequest(msg),
            SearchError::Index(e) if e.is_transient() => {
                AppError::ServiceUnavailable("search index unavailable".to_string())
            }
            SearchError::Index(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
