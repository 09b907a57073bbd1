//! MongoDB implementation of [`ProductRepository`].

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{doc, to_document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{ProductError, ProductResult};
use crate::models::{Product, ProductPatch, ProductView};
use crate::repository::ProductRepository;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Deserialize)]
struct StockOnly {
    stock: i64,
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// Products keyed by the numeric `id` field; Mongo's own `_id` is left to the driver.
pub struct MongoProductRepository {
    collection: Collection<Product>,
}

impl MongoProductRepository {
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, "products")
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<Product>(collection_name),
        }
    }

    /// The unique index on `id` is what actually rejects concurrent
    /// creates of the same product.
    pub async fn init_indexes(&self) -> ProductResult<()> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_id_unique".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "category": 1, "id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("idx_category_id".to_string())
                        .build(),
                )
                .build(),
        ];

        self.collection.create_indexes(indexes).await?;
        tracing::info!("Product indexes created successfully");
        Ok(())
    }

    fn views(&self) -> Collection<ProductView> {
        self.collection.clone_with_type()
    }

    fn stock(&self) -> Collection<StockOnly> {
        self.collection.clone_with_type()
    }
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> ProductResult<Option<ProductView>> {
        let view = self
            .views()
            .find_one(doc! { "id": id })
            .projection(doc! { "_id": 0, "stock": 0 })
            .await?;
        Ok(view)
    }

    #[instrument(skip(self))]
    async fn get_by_category(
        &self,
        category: &str,
        skip: u64,
        limit: i64,
    ) -> ProductResult<Vec<ProductView>> {
        let cursor = self
            .views()
            .find(doc! { "category": category })
            .projection(doc! { "_id": 0, "stock": 0 })
            .sort(doc! { "id": 1 })
            .skip(skip)
            .limit(limit)
            .await?;

        let products: Vec<ProductView> = cursor.try_collect().await?;
        Ok(products)
    }

    #[instrument(skip(self, product), fields(product_id = product.id))]
    async fn create(&self, product: &Product) -> ProductResult<()> {
        // Fast path only; the unique index settles races.
        if self.get_by_id(product.id).await?.is_some() {
            return Err(ProductError::AlreadyExists(product.id));
        }

        match self.collection.insert_one(product).await {
            Ok(_) => {
                tracing::info!(product_id = product.id, "Product created");
                Ok(())
            }
            Err(e) if is_duplicate_key(&e) => Err(ProductError::AlreadyExists(product.id)),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, patch))]
    async fn update_fields(&self, id: i64, patch: &ProductPatch) -> ProductResult<()> {
        let fields = to_document(patch)?;
        let result = self
            .collection
            .update_one(doc! { "id": id }, doc! { "$set": fields })
            .await?;

        if result.matched_count == 0 {
            return Err(ProductError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> ProductResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;
        if result.deleted_count == 0 {
            return Err(ProductError::NotFound(id));
        }
        tracing::info!(product_id = id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_stock(&self, id: i64) -> ProductResult<i64> {
        self.stock()
            .find_one(doc! { "id": id })
            .projection(doc! { "_id": 0, "stock": 1 })
            .await?
            .map(|doc| doc.stock)
            .ok_or(ProductError::NotFound(id))
    }

    #[instrument(skip(self))]
    async fn add_stock(&self, id: i64, quantity: i64) -> ProductResult<i64> {
        let ceiling = i64::MAX.saturating_sub(quantity);
        let updated = self
            .stock()
            .find_one_and_update(
                doc! { "id": id, "stock": { "$lte": ceiling } },
                doc! { "$inc": { "stock": quantity } },
            )
            .projection(doc! { "_id": 0, "stock": 1 })
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(doc) => Ok(doc.stock),
            None => {
                // Missing product surfaces as NotFound here.
                self.get_stock(id).await?;
                Err(ProductError::stock_overflow(id, quantity))
            }
        }
    }

    #[instrument(skip(self))]
    async fn reduce_stock(&self, id: i64, quantity: i64) -> ProductResult<i64> {
        let updated = self
            .stock()
            .find_one_and_update(
                doc! { "id": id, "stock": { "$gte": quantity } },
                doc! { "$inc": { "stock": -quantity } },
            )
            .projection(doc! { "_id": 0, "stock": 1 })
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(doc) => Ok(doc.stock),
            None => {
                // Either the product is gone or the guard refused the decrement.
                let available = self.get_stock(id).await?;
                Err(ProductError::InsufficientStock {
                    id,
                    available,
                    requested: quantity,
                })
            }
        }
    }
}
