//! Prometheus export for the indexer counters.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Installs the global Prometheus recorder. Call once, before the indexer
/// starts emitting.
pub fn init_metrics() -> eyre::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus recorder: {}", e))?;

    register_metric_descriptions();
    info!("Prometheus metrics recorder initialized");

    Ok(handle)
}

fn register_metric_descriptions() {
    describe_counter!(
        "search_indexer_messages_total",
        "Deliveries settled by the search indexer, by queue and outcome"
    );
    describe_histogram!(
        "search_indexer_message_duration_seconds",
        "Time spent applying one delivery to the search index"
    );
    describe_counter!(
        "search_indexer_settle_errors_total",
        "Deliveries the indexer failed to ack, nack or reject"
    );
}

/// `GET /metrics` in the Prometheus text format.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
