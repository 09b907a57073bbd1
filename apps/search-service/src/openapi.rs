//! OpenAPI documentation configuration

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Search Service",
        version = "0.1.0",
        description = "Product search over the catalog index",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:3004", description = "Local development server")
    ),
    nest(
        (path = "/api/v1/products", api = domain_search::ApiDoc)
    )
)]
pub struct ApiDoc;
