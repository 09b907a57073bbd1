use async_trait::async_trait;

use crate::error::ProductResult;
use crate::models::{Product, ProductPatch, ProductView};

/// Authoritative product store.
///
/// Stock changes are atomic increments in the backend; callers never
/// read-modify-write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> ProductResult<Option<ProductView>>;

    /// Products in `category` ordered by id.
    async fn get_by_category(
        &self,
        category: &str,
        skip: u64,
        limit: i64,
    ) -> ProductResult<Vec<ProductView>>;

    /// Fails with `AlreadyExists` when the id is taken.
    async fn create(&self, product: &Product) -> ProductResult<()>;

    /// Applies the supplied fields. `NotFound` when no row matches.
    async fn update_fields(&self, id: i64, patch: &ProductPatch) -> ProductResult<()>;

    async fn delete(&self, id: i64) -> ProductResult<()>;

    async fn get_stock(&self, id: i64) -> ProductResult<i64>;

    /// Returns the stock after the increment.
    async fn add_stock(&self, id: i64, quantity: i64) -> ProductResult<i64>;

    /// Decrements only when at least `quantity` is available, in the same
    /// storage operation. Returns the stock after the decrement.
    async fn reduce_stock(&self, id: i64, quantity: i64) -> ProductResult<i64>;
}
