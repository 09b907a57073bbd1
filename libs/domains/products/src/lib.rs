//! Products Domain
//!
//! Catalog mutations against the authoritative store, with cache
//! invalidation and event publication as detached side effects.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐      ┌───────┐  ┌───────────┐
//! │   Service   │ ───▶ │ Cache │  │ Event bus │   (detached)
//! └──────┬──────┘      └───────┘  └───────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← MongoDB or in-memory
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_products::{InMemoryCache, InMemoryProductRepository, ProductService, handlers};
//! use event_bus::InMemoryBroker;
//! use std::sync::Arc;
//!
//! let service = ProductService::new(
//!     InMemoryProductRepository::new(),
//!     Arc::new(InMemoryCache::new()),
//!     Arc::new(InMemoryBroker::new()),
//!     "products",
//! );
//! let router = handlers::router(service);
//! ```

pub mod cache;
pub mod error;
pub mod events;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;

pub use cache::{Cache, CacheError, CacheExt, InMemoryCache, RedisCache, product_cache_key};
pub use error::{ProductError, ProductResult};
pub use events::{PRODUCT_ENTITY, ProductEvent};
pub use handlers::ApiDoc;
pub use memory::InMemoryProductRepository;
pub use models::{CategoryQuery, Product, ProductPatch, ProductView, StockChange, StockLevel};
pub use crate::mongodb::MongoProductRepository;
pub use repository::ProductRepository;
pub use service::{MAX_PAGE_SIZE, ProductService};
