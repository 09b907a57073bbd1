//! API routes module

use axum::{routing::get, Json, Router};
use domain_search::{handlers, SearchIndex};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;

/// Create all API routes
pub fn routes(index: Arc<dyn SearchIndex>) -> Router {
    Router::new()
        .nest("/api/v1/products", handlers::router(index))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
