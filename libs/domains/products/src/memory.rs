//! In-process [`ProductRepository`] for tests and local runs.
//!
//! Every operation runs under one lock, so check-then-insert and the
//! conditional decrement are atomic here too.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{ProductError, ProductResult};
use crate::models::{Product, ProductPatch, ProductView};
use crate::repository::ProductRepository;

#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<BTreeMap<i64, Product>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`ProductError::Database`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> ProductResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ProductError::Database("store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get_by_id(&self, id: i64) -> ProductResult<Option<ProductView>> {
        self.check()?;
        Ok(self.products.read().await.get(&id).map(ProductView::from))
    }

    async fn get_by_category(
        &self,
        category: &str,
        skip: u64,
        limit: i64,
    ) -> ProductResult<Vec<ProductView>> {
        self.check()?;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.category == category)
            .skip(skip)
            .take(limit)
            .map(ProductView::from)
            .collect())
    }

    async fn create(&self, product: &Product) -> ProductResult<()> {
        self.check()?;
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(ProductError::AlreadyExists(product.id));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_fields(&self, id: i64, patch: &ProductPatch) -> ProductResult<()> {
        self.check()?;
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(ProductError::NotFound(id))?;
        patch.apply_to(product);
        Ok(())
    }

    async fn delete(&self, id: i64) -> ProductResult<()> {
        self.check()?;
        self.products
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(ProductError::NotFound(id))
    }

    async fn get_stock(&self, id: i64) -> ProductResult<i64> {
        self.check()?;
        self.products
            .read()
            .await
            .get(&id)
            .map(|p| p.stock)
            .ok_or(ProductError::NotFound(id))
    }

    async fn add_stock(&self, id: i64, quantity: i64) -> ProductResult<i64> {
        self.check()?;
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(ProductError::NotFound(id))?;
        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| ProductError::stock_overflow(id, quantity))?;
        Ok(product.stock)
    }

    async fn reduce_stock(&self, id: i64, quantity: i64) -> ProductResult<i64> {
        self.check()?;
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(ProductError::NotFound(id))?;
        if product.stock < quantity {
            return Err(ProductError::InsufficientStock {
                id,
                available: product.stock,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }
}
