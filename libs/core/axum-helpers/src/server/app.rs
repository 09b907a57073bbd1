use super::shutdown::ShutdownCoordinator;
use crate::errors::handlers::not_found;
use axum::Router;
use core_config::server::ServerConfig;
use std::future::Future;
use std::io;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

/// Default per-request deadline applied by [`create_router`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps API routes with request tracing, a request timeout and a JSON 404 fallback.
///
/// Routers are expected to carry their own state and full paths, for example
/// `/api/v1/products/{id}`.
pub fn create_router(apis: Router) -> Router {
    apis.fallback(not_found)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Serves `router` until `coordinator` signals shutdown, then runs `cleanup`
/// bounded by `shutdown_timeout`.
///
/// The caller decides what triggers shutdown: typically a task running
/// [`ShutdownCoordinator::wait_for_signal`], but a failing background loop
/// may call [`ShutdownCoordinator::shutdown`] as well.
pub async fn create_production_app<F>(
    router: Router,
    server_config: &ServerConfig,
    coordinator: ShutdownCoordinator,
    shutdown_timeout: Duration,
    cleanup: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let server_shutdown = coordinator.clone();
    let serve_result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        });

    // The server may also stop on its own error; make sure every subscriber hears about it.
    coordinator.shutdown();

    info!("Starting cleanup tasks (timeout: {:?})", shutdown_timeout);
    match tokio::time::timeout(shutdown_timeout, cleanup).await {
        Ok(()) => info!("Cleanup completed successfully"),
        Err(_) => tracing::warn!(
            "Cleanup exceeded timeout of {:?}, forcing shutdown",
            shutdown_timeout
        ),
    }

    serve_result
}
