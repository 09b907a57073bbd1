//! # Axum Helpers
//!
//! Shared HTTP plumbing for the catalog apps.
//!
//! - **[`errors`]**: `AppError` and the JSON error body every endpoint returns
//! - **[`extractors`]**: `IdPath`, `ValidatedJson`
//! - **[`server`]**: router layering, `/health`, graceful shutdown with cleanup

pub mod errors;
pub mod extractors;
pub mod server;

pub use errors::{AppError, ErrorCode, ErrorResponse, error_response};
pub use extractors::{IdPath, ValidatedJson};
pub use server::{
    HealthResponse, ShutdownCoordinator, create_production_app, create_router, health_router,
    shutdown_signal,
};
