//! HTTP handlers for product search

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use axum_helpers::ErrorResponse;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{SearchError, SearchResult};
use crate::index::SearchIndex;
use crate::models::{SearchDocument, SearchRequest, Sort, SortOrder};

pub const MAX_PAGE_SIZE: u64 = 100;

/// Fields the index can sort on.
const SORTABLE_FIELDS: [&str; 2] = ["price", "id"];

#[derive(OpenApi)]
#[openapi(
    paths(search_products),
    components(schemas(SearchDocument, ErrorResponse)),
    tags(
        (name = "Search", description = "Full-text product search")
    )
)]
pub struct ApiDoc;

/// Search routes, relative to the mount point (`/api/v1/products`).
pub fn router(index: Arc<dyn SearchIndex>) -> Router {
    Router::new()
        .route("/search", get(search_products))
        .with_state(index)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SearchResult<T> {
    value
        .parse()
        .map_err(|_| SearchError::Validation(format!("{key} must be a number, got '{value}'")))
}

/// Turns the raw query string into a [`SearchRequest`].
///
/// `sort`, `sort_by`, `price_min`, `price_max`, `page` and `limit` are
/// reserved; every other non-empty parameter is a match filter.
pub fn parse_search_params(params: HashMap<String, String>) -> SearchResult<SearchRequest> {
    let mut request = SearchRequest::new();
    let mut order = None;
    let mut sort_field = None;

    for (key, value) in params {
        match key.as_str() {
            "sort" => {
                let parsed = value.parse::<SortOrder>().map_err(|_| {
                    SearchError::Validation(format!("sort must be asc or desc, got '{value}'"))
                })?;
                order = Some(parsed);
            }
            "sort_by" => {
                if !SORTABLE_FIELDS.contains(&value.as_str()) {
                    return Err(SearchError::Validation(format!(
                        "cannot sort by '{value}', expected one of {SORTABLE_FIELDS:?}"
                    )));
                }
                sort_field = Some(value);
            }
            "price_min" => request.min_price = parse_number(&key, &value)?,
            "price_max" => request.max_price = parse_number(&key, &value)?,
            "page" => request.page = parse_number(&key, &value)?,
            "limit" => request.limit = parse_number(&key, &value)?,
            _ if value.is_empty() => {}
            _ => {
                request.filters.insert(key, value);
            }
        }
    }

    if request.page == 0 {
        return Err(SearchError::Validation("page starts at 1".to_string()));
    }
    if request.limit == 0 || request.limit > MAX_PAGE_SIZE {
        return Err(SearchError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    if order.is_some() || sort_field.is_some() {
        let field = sort_field.unwrap_or_else(|| Sort::DEFAULT_FIELD.to_string());
        request.sort = Some(Sort::new(field, order.unwrap_or_default()));
    }

    Ok(request)
}

/// Search products by field match, price range, sort and page
#[utoipa::path(
    get,
    path = "/search",
    tag = "Search",
    params(
        ("sort" = Option<String>, Query, description = "asc or desc"),
        ("sort_by" = Option<String>, Query, description = "price (default) or id"),
        ("price_min" = Option<f64>, Query, description = "Lower price bound, ignored when <= 0"),
        ("price_max" = Option<f64>, Query, description = "Upper price bound, ignored when <= 0"),
        ("page" = Option<u64>, Query, description = "Page number, from 1"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100")
    ),
    responses(
        (status = 200, description = "Matching products", body = Vec<SearchDocument>),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 503, description = "Search index unavailable", body = ErrorResponse)
    )
)]
async fn search_products(
    State(index): State<Arc<dyn SearchIndex>>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> SearchResult<Json<Vec<SearchDocument>>> {
    let Query(params) = params.map_err(|e| SearchError::Validation(e.body_text()))?;
    let request = parse_search_params(params)?;

    let hits = index.search(&request).await?;
    tracing::debug!(hits = hits.len(), "Search completed");
    Ok(Json(hits))
}
