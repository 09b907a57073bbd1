//! In-process [`SearchIndex`] that evaluates the same requests as the
//! Elasticsearch backend, closely enough for tests and local runs.
//!
//! `match` is a case-insensitive any-token match on the field's text; a
//! filter on a field the document does not have never matches.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::index::{IndexError, SearchIndex};
use crate::models::{DocumentPatch, SearchDocument, SearchRequest, SortOrder};

#[derive(Clone, Default)]
pub struct InMemorySearchIndex {
    docs: Arc<RwLock<BTreeMap<i64, SearchDocument>>>,
    failing: Arc<AtomicBool>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`IndexError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn check(&self) -> Result<(), IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(IndexError::Unavailable)
        } else {
            Ok(())
        }
    }
}

fn field_text(doc: &SearchDocument, field: &str) -> Option<String> {
    match field {
        "id" => Some(doc.id.to_string()),
        "name" => Some(doc.name.clone()),
        "category" => Some(doc.category.clone()),
        "price" => Some(doc.price.to_string()),
        "description" => Some(doc.description.clone()),
        "images" => Some(doc.images.join(" ")),
        _ => {
            let key = field.strip_prefix("attributes.")?;
            match doc.attributes.get(key)? {
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }
        }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn matches(doc: &SearchDocument, field: &str, query: &str) -> bool {
    let Some(text) = field_text(doc, field) else {
        return false;
    };
    let haystack: Vec<String> = tokens(&text).collect();
    tokens(query).any(|t| haystack.contains(&t))
}

fn compare(a: &SearchDocument, b: &SearchDocument, field: &str) -> CmpOrdering {
    match field {
        "price" => a.price.total_cmp(&b.price),
        "name" => a.name.cmp(&b.name),
        "category" => a.category.cmp(&b.category),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError> {
        self.check()?;
        self.docs.write().await.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn patch(&self, patch: &DocumentPatch) -> Result<(), IndexError> {
        self.check()?;
        let mut docs = self.docs.write().await;
        let doc = docs
            .get_mut(&patch.id)
            .ok_or(IndexError::DocumentMissing(patch.id))?;
        patch.apply(doc);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), IndexError> {
        self.check()?;
        self.docs.write().await.remove(&id);
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<SearchDocument>, IndexError> {
        self.check()?;
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, IndexError> {
        self.check()?;
        let docs = self.docs.read().await;

        let mut hits: Vec<SearchDocument> = docs
            .values()
            .filter(|doc| {
                request
                    .filters
                    .iter()
                    .all(|(field, value)| matches(doc, field, value))
            })
            .filter(|doc| request.min_price <= 0.0 || doc.price >= request.min_price)
            .filter(|doc| request.max_price <= 0.0 || doc.price <= request.max_price)
            .cloned()
            .collect();

        // Ties fall back to id order, which the BTreeMap already gives us.
        if let Some(sort) = &request.sort {
            hits.sort_by(|a, b| {
                let ordering = compare(a, b, &sort.field);
                match sort.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let from = usize::try_from(request.from()).unwrap_or(usize::MAX);
        let size = usize::try_from(request.limit).unwrap_or(usize::MAX);
        Ok(hits.into_iter().skip(from).take(size).collect())
    }
}
