//! HTTP handlers for the Products API

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{ErrorResponse, IdPath, ValidatedJson};
use std::sync::Arc;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::{ProductError, ProductResult};
use crate::models::{CategoryQuery, Product, ProductPatch, ProductView, StockChange, StockLevel};
use crate::repository::ProductRepository;
use crate::service::ProductService;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_by_category,
        create_product,
        get_product,
        update_product,
        delete_product,
        get_stock,
        add_stock,
        reduce_stock,
    ),
    components(schemas(Product, ProductView, ProductPatch, StockChange, StockLevel, ErrorResponse)),
    tags(
        (name = "Products", description = "Catalog mutations and reads")
    )
)]
pub struct ApiDoc;

/// Product routes, relative to the mount point (`/api/v1/products`).
pub fn router<R: ProductRepository + 'static>(service: ProductService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_by_category).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/stock", get(get_stock))
        .route("/{id}/add-stock", post(add_stock))
        .route("/{id}/reduce-stock", post(reduce_stock))
        .with_state(shared_service)
}

/// List products of one category, ordered by id
#[utoipa::path(
    get,
    path = "",
    tag = "Products",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Page of products", body = Vec<ProductView>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
async fn list_by_category<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ProductResult<Json<Vec<ProductView>>> {
    let Query(query) = query.map_err(|e| ProductError::Validation(e.body_text()))?;
    query.validate()?;

    let products = service
        .get_by_category(&query.category, query.page, query.limit)
        .await?;
    Ok(Json(products))
}

/// Create a product
#[utoipa::path(
    post,
    path = "",
    tag = "Products",
    request_body = Product,
    responses(
        (status = 201, description = "Product created", body = ProductView),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Id already taken", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
async fn create_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    ValidatedJson(product): ValidatedJson<Product>,
) -> ProductResult<impl IntoResponse> {
    let view = ProductView::from(&product);
    service.create_product(product).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get a product (served from cache when possible)
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = ProductView),
        (status = 404, description = "No such product", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
async fn get_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
) -> ProductResult<Json<ProductView>> {
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// Update the supplied fields of a product
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductPatch,
    responses(
        (status = 204, description = "Product updated"),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "No such product", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
async fn update_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
    ValidatedJson(patch): ValidatedJson<ProductPatch>,
) -> ProductResult<StatusCode> {
    service.update_product(id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "No such product", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
) -> ProductResult<StatusCode> {
    service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current stock of a product
#[utoipa::path(
    get,
    path = "/{id}/stock",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Stock level", body = StockLevel),
        (status = 404, description = "No such product", body = ErrorResponse)
    )
)]
async fn get_stock<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
) -> ProductResult<Json<StockLevel>> {
    Ok(Json(service.get_stock(id).await?))
}

/// Atomically add stock
#[utoipa::path(
    post,
    path = "/{id}/add-stock",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = StockChange,
    responses(
        (status = 200, description = "New stock level", body = StockLevel),
        (status = 400, description = "Invalid quantity", body = ErrorResponse),
        (status = 404, description = "No such product", body = ErrorResponse)
    )
)]
async fn add_stock<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
    ValidatedJson(change): ValidatedJson<StockChange>,
) -> ProductResult<Json<StockLevel>> {
    Ok(Json(service.add_stock(id, change.quantity).await?))
}

/// Atomically remove stock, refusing to go below zero
#[utoipa::path(
    post,
    path = "/{id}/reduce-stock",
    tag = "Products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = StockChange,
    responses(
        (status = 200, description = "New stock level", body = StockLevel),
        (status = 400, description = "Invalid quantity or not enough stock", body = ErrorResponse),
        (status = 404, description = "No such product", body = ErrorResponse)
    )
)]
async fn reduce_stock<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
    ValidatedJson(change): ValidatedJson<StockChange>,
) -> ProductResult<Json<StockLevel>> {
    Ok(Json(service.reduce_stock(id, change.quantity).await?))
}
