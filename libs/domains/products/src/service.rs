//! Product Service - catalog mutations and cached reads
//!
//! The store call is the only thing a request waits for. Cache invalidation,
//! cache population and event publication run as detached tasks whose
//! failures are logged and dropped: a lost publish leaves the search index
//! behind until the product is written again.

use event_bus::EventBus;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, instrument, warn};
use validator::Validate;

use crate::cache::{Cache, CacheExt, product_cache_key};
use crate::error::{ProductError, ProductResult};
use crate::events::ProductEvent;
use crate::models::{Product, ProductPatch, ProductView, StockLevel};
use crate::repository::ProductRepository;

pub const MAX_PAGE_SIZE: u64 = 100;

pub struct ProductService<R: ProductRepository> {
    repository: Arc<R>,
    cache: Arc<dyn Cache>,
    events: Arc<dyn EventBus>,
    exchange: String,
    background: TaskTracker,
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(
        repository: R,
        cache: Arc<dyn Cache>,
        events: Arc<dyn EventBus>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            cache,
            events,
            exchange: exchange.into(),
            background: TaskTracker::new(),
        }
    }

    #[instrument(skip(self, product), fields(product_id = product.id))]
    pub async fn create_product(&self, product: Product) -> ProductResult<()> {
        product.validate()?;

        self.repository.create(&product).await?;
        self.publish(ProductEvent::Created(product));
        Ok(())
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> ProductResult<()> {
        patch.validate()?;
        if patch.is_empty() {
            return Err(ProductError::Validation("no fields to update".into()));
        }

        self.repository.update_fields(id, &patch).await?;
        self.invalidate(id);
        self.publish(ProductEvent::Updated { id, patch });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i64) -> ProductResult<()> {
        self.repository.delete(id).await?;
        self.invalidate(id);
        self.publish(ProductEvent::Deleted { id });
        Ok(())
    }

    /// Stock is not part of the cached or indexed view, so nothing else is touched.
    #[instrument(skip(self))]
    pub async fn add_stock(&self, id: i64, quantity: i64) -> ProductResult<StockLevel> {
        validate_quantity(quantity)?;
        let stock = self.repository.add_stock(id, quantity).await?;
        Ok(StockLevel { id, stock })
    }

    #[instrument(skip(self))]
    pub async fn reduce_stock(&self, id: i64, quantity: i64) -> ProductResult<StockLevel> {
        validate_quantity(quantity)?;
        let stock = self.repository.reduce_stock(id, quantity).await?;
        Ok(StockLevel { id, stock })
    }

    #[instrument(skip(self))]
    pub async fn get_stock(&self, id: i64) -> ProductResult<StockLevel> {
        let stock = self.repository.get_stock(id).await?;
        Ok(StockLevel { id, stock })
    }

    /// Read-through: a cache hit returns immediately; anything else reads the
    /// store and fills the cache in the background.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i64) -> ProductResult<ProductView> {
        let key = product_cache_key(id);
        match self.cache.get_json::<ProductView>(&key).await {
            Ok(Some(view)) => {
                debug!(product_id = id, "Cache hit");
                return Ok(view);
            }
            Ok(None) => debug!(product_id = id, "Cache miss"),
            Err(e) => warn!(product_id = id, error = %e, "Cache read failed, treating as miss"),
        }

        let view = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(ProductError::NotFound(id))?;

        self.populate(key, view.clone());
        Ok(view)
    }

    /// Always served from the store.
    #[instrument(skip(self))]
    pub async fn get_by_category(
        &self,
        category: &str,
        page: u64,
        limit: u64,
    ) -> ProductResult<Vec<ProductView>> {
        if page < 1 {
            return Err(ProductError::Validation("page must be at least 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ProductError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let skip = (page - 1).saturating_mul(limit);
        // limit <= MAX_PAGE_SIZE, the cast cannot truncate.
        self.repository
            .get_by_category(category, skip, limit as i64)
            .await
    }

    /// Waits for every detached side effect spawned so far.
    ///
    /// Called on shutdown so queued invalidations and publishes get a chance
    /// to finish. Request handlers never call it.
    pub async fn flush_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    fn publish(&self, event: ProductEvent) {
        let events = Arc::clone(&self.events);
        let exchange = self.exchange.clone();

        self.background.spawn(
            async move {
                let routing_key = event.routing_key().to_string();
                let product_id = event.product_id();
                let payload = match event.payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(product_id, %routing_key, error = %e, "Failed to encode event");
                        return;
                    }
                };

                match events.publish(&exchange, &routing_key, payload).await {
                    Ok(()) => debug!(product_id, %routing_key, "Event published"),
                    Err(e) => warn!(
                        product_id,
                        %routing_key,
                        error = %e,
                        "Failed to publish event, index will miss this change"
                    ),
                }
            }
            .in_current_span(),
        );
    }

    fn invalidate(&self, id: i64) {
        let cache = Arc::clone(&self.cache);

        self.background.spawn(
            async move {
                let key = product_cache_key(id);
                if let Err(e) = cache.del(&key).await {
                    warn!(product_id = id, error = %e, "Failed to invalidate cache entry");
                }
            }
            .in_current_span(),
        );
    }

    fn populate(&self, key: String, view: ProductView) {
        let cache = Arc::clone(&self.cache);

        self.background.spawn(
            async move {
                if let Err(e) = cache.set_json(&key, &view).await {
                    warn!(product_id = view.id, error = %e, "Failed to populate cache");
                }
            }
            .in_current_span(),
        );
    }
}

fn validate_quantity(quantity: i64) -> ProductResult<()> {
    if quantity < 1 {
        return Err(ProductError::Validation(
            "quantity must be at least 1".into(),
        ));
    }
    Ok(())
}

impl<R: ProductRepository> Clone for ProductService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            events: Arc::clone(&self.events),
            exchange: self.exchange.clone(),
            background: self.background.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, InMemoryCache, MockCache};
    use crate::memory::InMemoryProductRepository;
    use crate::repository::MockProductRepository;
    use event_bus::InMemoryBroker;
    use mockall::predicate::eq;
    use serde_json::{Map, Value, json};

    const EXCHANGE: &str = "products";

    fn widget() -> Product {
        Product {
            id: 1,
            name: "Widget".into(),
            category: "tools".into(),
            price: 100.0,
            description: String::new(),
            stock: 10,
            images: vec![],
            attributes: Map::new(),
        }
    }

    fn service<R: ProductRepository>(
        repository: R,
        cache: Arc<dyn Cache>,
        broker: &InMemoryBroker,
    ) -> ProductService<R> {
        ProductService::new(repository, cache, Arc::new(broker.clone()), EXCHANGE)
    }

    fn payload(broker: &InMemoryBroker, index: usize) -> (String, Value) {
        let message = &broker.published()[index];
        (
            message.routing_key.clone(),
            serde_json::from_slice(&message.payload).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_publishes_full_product() {
        let broker = InMemoryBroker::new();
        let svc = service(
            InMemoryProductRepository::new(),
            Arc::new(InMemoryCache::new()),
            &broker,
        );

        svc.create_product(widget()).await.unwrap();
        svc.flush_background().await;

        let (routing_key, body) = payload(&broker, 0);
        assert_eq!(routing_key, "product.created");
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "Widget");
        assert_eq!(broker.published()[0].exchange, EXCHANGE);
    }

    #[tokio::test]
    async fn test_create_validation_fails_before_store() {
        let mut repo = MockProductRepository::new();
        repo.expect_create().never();

        let broker = InMemoryBroker::new();
        let svc = service(repo, Arc::new(InMemoryCache::new()), &broker);

        let mut product = widget();
        product.price = -1.0;
        let err = svc.create_product(product).await.unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));

        svc.flush_background().await;
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_publishes_nothing() {
        let mut repo = MockProductRepository::new();
        repo.expect_create()
            .times(1)
            .returning(|p| Err(ProductError::AlreadyExists(p.id)));

        let broker = InMemoryBroker::new();
        let svc = service(repo, Arc::new(InMemoryCache::new()), &broker);

        let err = svc.create_product(widget()).await.unwrap_err();
        assert!(matches!(err, ProductError::AlreadyExists(1)));

        svc.flush_background().await;
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_update_invalidates_cache_and_publishes_patch() {
        let cache = InMemoryCache::new();
        let broker = InMemoryBroker::new();
        let repo = InMemoryProductRepository::new();
        let svc = service(repo, Arc::new(cache.clone()), &broker);

        svc.create_product(widget()).await.unwrap();
        svc.get_product(1).await.unwrap();
        svc.flush_background().await;
        assert!(cache.contains("products:1").await);

        let patch = ProductPatch {
            price: Some(150.0),
            ..Default::default()
        };
        svc.update_product(1, patch).await.unwrap();
        svc.flush_background().await;

        assert!(!cache.contains("products:1").await);
        let (routing_key, body) = payload(&broker, 1);
        assert_eq!(routing_key, "product.updated");
        assert_eq!(body, json!({ "id": 1, "price": 150.0 }));
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let mut repo = MockProductRepository::new();
        repo.expect_update_fields()
            .with(eq(7), mockall::predicate::always())
            .times(1)
            .returning(|id, _| Err(ProductError::NotFound(id)));

        let mut cache = MockCache::new();
        cache.expect_del().never();

        let broker = InMemoryBroker::new();
        let svc = service(repo, Arc::new(cache), &broker);

        let patch = ProductPatch {
            name: Some("Gadget".into()),
            ..Default::default()
        };
        let err = svc.update_product(7, patch).await.unwrap_err();
        assert!(matches!(err, ProductError::NotFound(7)));

        svc.flush_background().await;
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected() {
        let broker = InMemoryBroker::new();
        let svc = service(
            MockProductRepository::new(),
            Arc::new(InMemoryCache::new()),
            &broker,
        );
        let err = svc
            .update_product(1, ProductPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_publishes_id_only() {
        let broker = InMemoryBroker::new();
        let repo = InMemoryProductRepository::new();
        let svc = service(repo, Arc::new(InMemoryCache::new()), &broker);

        svc.create_product(widget()).await.unwrap();
        svc.flush_background().await;
        svc.delete_product(1).await.unwrap();
        svc.flush_background().await;

        let (routing_key, body) = payload(&broker, 1);
        assert_eq!(routing_key, "product.deleted");
        assert_eq!(body, json!({ "id": 1 }));
        assert!(matches!(
            svc.get_product(1).await,
            Err(ProductError::NotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_side_effect_failures_do_not_fail_requests() {
        let cache = InMemoryCache::new();
        cache.set_failing(true);
        let broker = InMemoryBroker::new();
        broker.set_failing(true);

        let svc = service(
            InMemoryProductRepository::new(),
            Arc::new(cache),
            &broker,
        );

        svc.create_product(widget()).await.unwrap();
        svc.update_product(
            1,
            ProductPatch {
                price: Some(120.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(svc.get_product(1).await.unwrap().price, 120.0);
        svc.delete_product(1).await.unwrap();

        svc.flush_background().await;
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let mut repo = MockProductRepository::new();
        repo.expect_get_by_id().never();

        let cache = InMemoryCache::new();
        let view = ProductView::from(widget());
        cache.set_json("products:1", &view).await.unwrap();

        let svc = service(repo, Arc::new(cache), &InMemoryBroker::new());
        assert_eq!(svc.get_product(1).await.unwrap(), view);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_a_miss() {
        let mut repo = MockProductRepository::new();
        repo.expect_get_by_id()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(Some(ProductView::from(widget()))));

        let mut cache = MockCache::new();
        cache
            .expect_get()
            .withf(|key| key == "products:1")
            .returning(|_| Ok(Some("{broken".to_string())));
        cache.expect_set().times(1).returning(|_, _| Ok(()));

        let svc = service(repo, Arc::new(cache), &InMemoryBroker::new());
        let view = svc.get_product(1).await.unwrap();
        assert_eq!(view.name, "Widget");
        svc.flush_background().await;
    }

    #[tokio::test]
    async fn test_cache_error_is_a_miss() {
        let mut repo = MockProductRepository::new();
        repo.expect_get_by_id()
            .returning(|_| Ok(Some(ProductView::from(widget()))));

        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError::Unavailable));
        cache
            .expect_set()
            .returning(|_, _| Err(CacheError::Unavailable));

        let svc = service(repo, Arc::new(cache), &InMemoryBroker::new());
        assert!(svc.get_product(1).await.is_ok());
        svc.flush_background().await;
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let mut repo = MockProductRepository::new();
        repo.expect_get_by_id().returning(|_| Ok(None));

        let svc = service(
            repo,
            Arc::new(InMemoryCache::new()),
            &InMemoryBroker::new(),
        );
        assert!(matches!(
            svc.get_product(3).await,
            Err(ProductError::NotFound(3))
        ));
    }

    #[tokio::test]
    async fn test_stock_changes_touch_neither_cache_nor_bus() {
        let mut cache = MockCache::new();
        cache.expect_del().never();
        cache.expect_set().never();

        let broker = InMemoryBroker::new();
        let repo = InMemoryProductRepository::new();
        repo.create(&widget()).await.unwrap();
        let svc = service(repo, Arc::new(cache), &broker);

        assert_eq!(svc.add_stock(1, 5).await.unwrap().stock, 15);
        assert_eq!(svc.reduce_stock(1, 3).await.unwrap().stock, 12);
        assert_eq!(svc.get_stock(1).await.unwrap().stock, 12);

        svc.flush_background().await;
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_stock_quantity_must_be_positive() {
        let mut repo = MockProductRepository::new();
        repo.expect_add_stock().never();
        repo.expect_reduce_stock().never();

        let svc = service(
            repo,
            Arc::new(InMemoryCache::new()),
            &InMemoryBroker::new(),
        );
        assert!(matches!(
            svc.add_stock(1, 0).await,
            Err(ProductError::Validation(_))
        ));
        assert!(matches!(
            svc.reduce_stock(1, -2).await,
            Err(ProductError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_stock_changes_commute() {
        let repo = InMemoryProductRepository::new();
        repo.create(&widget()).await.unwrap();
        let svc = service(
            repo,
            Arc::new(InMemoryCache::new()),
            &InMemoryBroker::new(),
        );

        let add = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.add_stock(1, 5).await })
        };
        let reduce = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.reduce_stock(1, 3).await })
        };
        add.await.unwrap().unwrap();
        reduce.await.unwrap().unwrap();

        assert_eq!(svc.get_stock(1).await.unwrap().stock, 12);
    }

    #[tokio::test]
    async fn test_get_by_category_pagination() {
        let mut repo = MockProductRepository::new();
        repo.expect_get_by_category()
            .withf(|category, skip, limit| category == "tools" && *skip == 20 && *limit == 10)
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let svc = service(
            repo,
            Arc::new(InMemoryCache::new()),
            &InMemoryBroker::new(),
        );
        assert!(svc.get_by_category("tools", 3, 10).await.unwrap().is_empty());
        assert!(matches!(
            svc.get_by_category("tools", 0, 10).await,
            Err(ProductError::Validation(_))
        ));
        assert!(matches!(
            svc.get_by_category("tools", 1, 101).await,
            Err(ProductError::Validation(_))
        ));
    }
}
