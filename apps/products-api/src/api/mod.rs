//! API routes module

use axum::{routing::get, Json, Router};
use domain_products::{handlers, ProductRepository, ProductService};
use utoipa::OpenApi;

use crate::openapi::ApiDoc;

/// Create all API routes
pub fn routes<R: ProductRepository + 'static>(service: ProductService<R>) -> Router {
    Router::new()
        .nest("/api/v1/products", handlers::router(service))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use domain_products::{InMemoryCache, InMemoryProductRepository};
    use event_bus::InMemoryBroker;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = ProductService::new(
            InMemoryProductRepository::new(),
            Arc::new(InMemoryCache::new()),
            Arc::new(InMemoryBroker::new()),
            "products",
        );
        axum_helpers::create_router(routes(service))
    }

    #[tokio::test]
    async fn test_products_are_mounted_under_api_v1() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/products/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_product_paths() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/v1/products/{id}/add-stock"].is_object());
    }
}
