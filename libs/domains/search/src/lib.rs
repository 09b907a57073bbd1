//! Search Domain
//!
//! Keeps a query-optimized copy of the catalog in step with product events
//! and serves filtered, sorted, paged searches over it.
//!
//! ```text
//! queue ──▶ SearchIndexer ──▶ SearchIndex ◀── handlers (GET /search)
//!                              │
//!                              ├─ ElasticsearchIndex
//!                              └─ InMemorySearchIndex
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_search::{InMemorySearchIndex, SearchIndexer, handlers};
//! use event_bus::InMemoryBroker;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let index = Arc::new(InMemorySearchIndex::new());
//! let broker = InMemoryBroker::new();
//! let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!
//! let indexer = SearchIndexer::new(index.clone(), "product");
//! tokio::spawn(async move { indexer.run(broker.subscribe("product"), shutdown).await });
//! let router = handlers::router(index);
//! # }
//! ```

pub mod elasticsearch;
pub mod error;
pub mod handlers;
pub mod index;
pub mod indexer;
pub mod memory;
pub mod models;
pub mod query;

pub use crate::elasticsearch::{ElasticsearchConfig, ElasticsearchIndex};
pub use error::{SearchError, SearchResult};
pub use handlers::{ApiDoc, parse_search_params};
pub use index::{IndexError, SearchIndex};
pub use indexer::SearchIndexer;
pub use memory::InMemorySearchIndex;
pub use models::{DocumentPatch, SearchDocument, SearchRequest, Sort, SortOrder};
pub use query::build_query;
