//! Server plumbing shared by the HTTP apps.
//!
//! ```ignore
//! use axum_helpers::server::{ShutdownCoordinator, create_production_app, create_router, health_router};
//!
//! let app = create_router(api_routes).merge(health_router(core_config::app_info!()));
//! let coordinator = ShutdownCoordinator::new();
//! tokio::spawn({
//!     let coordinator = coordinator.clone();
//!     async move { coordinator.wait_for_signal().await }
//! });
//! create_production_app(app, &config, coordinator, Duration::from_secs(30), cleanup).await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{REQUEST_TIMEOUT, create_production_app, create_router};
pub use health::{HealthResponse, health_handler, health_router};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
