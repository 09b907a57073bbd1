//! End-to-end consistency tests
//!
//! Product service → in-memory broker → search indexer → in-memory index,
//! with the same exchange, queue and binding the services use.

use domain_products::{
    Cache, InMemoryCache, InMemoryProductRepository, Product, ProductError, ProductPatch,
    ProductService, product_cache_key,
};
use domain_search::{InMemorySearchIndex, SearchIndex, SearchIndexer, SearchRequest, Sort, SortOrder};
use event_bus::{Disposition, EventBus, InMemoryBroker, InMemorySubscription, Subscription};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

const EXCHANGE: &str = "products";
const QUEUE: &str = "product";

struct Pipeline {
    service: ProductService<InMemoryProductRepository>,
    cache: Arc<InMemoryCache>,
    broker: InMemoryBroker,
    index: Arc<InMemorySearchIndex>,
    indexer: SearchIndexer,
    subscription: InMemorySubscription,
}

impl Pipeline {
    fn new() -> Self {
        let broker = InMemoryBroker::new();
        broker.bind(EXCHANGE, QUEUE, "product.*");

        let cache = Arc::new(InMemoryCache::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let service = ProductService::new(
            InMemoryProductRepository::new(),
            cache.clone(),
            Arc::new(broker.clone()),
            EXCHANGE,
        );

        Self {
            service,
            cache,
            subscription: broker.subscribe(QUEUE),
            indexer: SearchIndexer::new(index.clone(), QUEUE),
            broker,
            index,
        }
    }

    /// Lets detached side effects finish, then feeds every queued event to
    /// the indexer and settles it.
    async fn propagate(&mut self) -> Vec<Disposition> {
        self.service.flush_background().await;

        let mut outcomes = Vec::new();
        while self.broker.ready_count(QUEUE) > 0 {
            let delivery = self.subscription.next_delivery().await.unwrap().unwrap();
            let disposition = self.indexer.handle(&delivery).await;
            self.subscription.settle(&delivery, disposition).await.unwrap();
            outcomes.push(disposition);
        }
        outcomes
    }
}

fn product(id: i64, name: &str, category: &str, price: f64, stock: i64) -> Product {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "category": category,
        "price": price,
        "stock": stock
    }))
    .unwrap()
}

#[tokio::test]
async fn test_create_reaches_index_without_stock() {
    let mut p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();

    assert_eq!(p.propagate().await, vec![Disposition::Ack]);

    let published = p.broker.published();
    assert_eq!(published[0].routing_key, "product.created");
    let payload: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(payload["stock"], 10);

    let doc = p.index.get(1).await.unwrap().unwrap();
    assert_eq!((doc.id, doc.name.as_str(), doc.price), (1, "Widget", 100.0));
    assert!(serde_json::to_value(&doc).unwrap().get("stock").is_none());
}

#[tokio::test]
async fn test_update_invalidates_cache_and_patches_index() {
    let mut p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();
    p.propagate().await;

    // Warm the cache through a read.
    p.service.get_product(1).await.unwrap();
    p.service.flush_background().await;
    assert!(p.cache.contains(&product_cache_key(1)).await);

    let patch = ProductPatch {
        price: Some(150.0),
        ..Default::default()
    };
    p.service.update_product(1, patch).await.unwrap();
    assert_eq!(p.propagate().await, vec![Disposition::Ack]);

    assert_eq!(p.cache.get(&product_cache_key(1)).await.unwrap(), None);

    let updated = p.broker.published().into_iter().last().unwrap();
    assert_eq!(updated.routing_key, "product.updated");
    let payload: serde_json::Value = serde_json::from_slice(&updated.payload).unwrap();
    assert_eq!(payload, json!({ "id": 1, "price": 150.0 }));

    let doc = p.index.get(1).await.unwrap().unwrap();
    assert_eq!(doc.price, 150.0);
    assert_eq!(doc.name, "Widget");
    assert_eq!(p.service.get_product(1).await.unwrap().price, 150.0);
}

#[tokio::test]
async fn test_delete_removes_document_and_product() {
    let mut p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();
    p.propagate().await;

    p.service.delete_product(1).await.unwrap();
    assert_eq!(p.propagate().await, vec![Disposition::Ack]);

    let deleted = p.broker.published().into_iter().last().unwrap();
    assert_eq!(deleted.routing_key, "product.deleted");
    assert_eq!(deleted.payload, br#"{"id":1}"#.to_vec());

    assert_eq!(p.index.get(1).await.unwrap(), None);
    assert!(matches!(
        p.service.get_product(1).await,
        Err(ProductError::NotFound(1))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stock_changes_commute() {
    let p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 1_000))
        .await
        .unwrap();

    // Interleaved adds and reductions; the floor is never in reach.
    let deltas: Vec<i64> = (0..64)
        .map(|i| if i % 2 == 0 { i % 7 + 1 } else { -(i % 5 + 1) })
        .collect();

    let tasks: Vec<_> = deltas
        .iter()
        .map(|&delta| {
            let service = p.service.clone();
            tokio::spawn(async move {
                if delta >= 0 {
                    service.add_stock(1, delta).await
                } else {
                    service.reduce_stock(1, -delta).await
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let expected = 1_000 + deltas.iter().sum::<i64>();
    assert_eq!(p.service.get_stock(1).await.unwrap().stock, expected);
}

#[tokio::test]
async fn test_redelivered_events_converge_to_same_document() {
    let mut p = Pipeline::new();
    for (id, name) in [(1, "Widget"), (2, "Gadget")] {
        p.service
            .create_product(product(id, name, "tools", 100.0, 10))
            .await
            .unwrap();
        p.service.flush_background().await;
    }
    p.service
        .update_product(
            1,
            ProductPatch {
                name: Some("Widget Pro".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    p.service.flush_background().await;
    p.service.delete_product(2).await.unwrap();
    p.propagate().await;

    let published = p.broker.published();
    assert_eq!(
        published.iter().map(|m| m.routing_key.as_str()).collect::<Vec<_>>(),
        vec![
            "product.created",
            "product.created",
            "product.updated",
            "product.deleted"
        ]
    );
    let once = p.index.get(1).await.unwrap();
    assert_eq!(p.index.get(2).await.unwrap(), None);

    // Replay everything that was published, as a broker would after a
    // consumer crash between apply and ack.
    for message in published {
        p.broker
            .publish(&message.exchange, &message.routing_key, message.payload)
            .await
            .unwrap();
    }
    let outcomes = p.propagate().await;

    assert_eq!(outcomes, vec![Disposition::Ack; 4]);
    assert_eq!(p.index.get(1).await.unwrap(), once);
    assert_eq!(p.index.get(2).await.unwrap(), None);
    assert_eq!(p.index.len().await, 1);
}

#[tokio::test]
async fn test_repeated_delete_is_acknowledged() {
    let mut p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();
    p.service.flush_background().await;
    p.service.delete_product(1).await.unwrap();
    p.propagate().await;

    // Same delete again, after the document is already gone.
    p.broker
        .publish(EXCHANGE, "product.deleted", br#"{"id":1}"#.to_vec())
        .await
        .unwrap();

    assert_eq!(p.propagate().await, vec![Disposition::Ack]);
    assert!(p.index.is_empty().await);
    assert!(p.broker.rejected(QUEUE).is_empty());
}

#[tokio::test]
async fn test_poison_message_is_rejected_after_one_retry() {
    let mut p = Pipeline::new();
    p.broker
        .publish(EXCHANGE, "product.created", b"{not json".to_vec())
        .await
        .unwrap();

    assert_eq!(
        p.propagate().await,
        vec![Disposition::NackRequeue, Disposition::Reject]
    );
    assert_eq!(p.broker.rejected(QUEUE).len(), 1);
    assert_eq!(p.broker.ready_count(QUEUE), 0);
    assert_eq!(p.broker.unacked_count(QUEUE), 0);
}

#[tokio::test]
async fn test_index_outage_requeues_then_rejects() {
    let mut p = Pipeline::new();
    p.index.set_failing(true);
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();

    assert_eq!(
        p.propagate().await,
        vec![Disposition::NackRequeue, Disposition::Reject]
    );
    p.index.set_failing(false);
    assert!(p.index.is_empty().await);
}

#[tokio::test]
async fn test_search_results_are_deterministic() {
    let mut p = Pipeline::new();
    for (id, name, price) in [
        (1, "Red Widget", 30.0),
        (2, "Blue Widget", 10.0),
        (3, "Green Widget", 20.0),
        (4, "Hammer", 20.0),
    ] {
        p.service
            .create_product(product(id, name, "tools", price, 1))
            .await
            .unwrap();
    }
    p.propagate().await;

    let request = SearchRequest::new()
        .filter("name", "widget")
        .price_range(15.0, 0.0)
        .sorted(Sort::by_price(SortOrder::Asc))
        .paged(1, 10);

    let first = p.index.search(&request).await.unwrap();
    let second = p.index.search(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.iter().map(|d| d.id).collect::<Vec<_>>(), vec![3, 1]);
}

#[tokio::test]
async fn test_indexer_loop_drains_queue_and_stops() {
    let p = Pipeline::new();
    p.service
        .create_product(product(1, "Widget", "tools", 100.0, 10))
        .await
        .unwrap();
    p.service.flush_background().await;
    p.broker.close(QUEUE);

    let (_tx, shutdown) = watch::channel(false);
    p.indexer.run(p.broker.subscribe(QUEUE), shutdown).await;

    assert!(p.index.get(1).await.unwrap().is_some());
    assert_eq!(p.broker.unacked_count(QUEUE), 0);
}
