use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product {0} not found")]
    NotFound(i64),

    #[error("Product {0} already exists")]
    AlreadyExists(i64),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Insufficient stock for product {id}: available {available}, requested {requested}")]
    InsufficientStock {
        id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Database error: {0}")]
    Database(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl ProductError {
    pub fn stock_overflow(id: i64, quantity: i64) -> Self {
        ProductError::Validation(format!(
            "adding {quantity} would overflow the stock of product {id}"
        ))
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProductError::AlreadyExists(_) => AppError::Conflict(err.to_string()),
            ProductError::Validation(msg) => AppError::BadRequest(msg),
            ProductError::InsufficientStock { .. } => AppError::BadRequest(err.to_string()),
            ProductError::Database(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for ProductError {
    fn from(err: mongodb::error::Error) -> Self {
        ProductError::Database(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for ProductError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ProductError::Database(format!("failed to encode document: {err}"))
    }
}

impl From<validator::ValidationErrors> for ProductError {
    fn from(err: validator::ValidationErrors) -> Self {
        ProductError::Validation(err.to_string())
    }
}
