use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Indexed form of a product. Extra fields in the event payload, such as
/// `stock`, are dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchDocument {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: Map<String, Value>,
}

/// Partial update decoded from a `product.updated` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

impl DocumentPatch {
    /// The supplied fields, without `id`.
    pub fn fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("id");
        Ok(fields)
    }

    pub fn apply(&self, doc: &mut SearchDocument) {
        if let Some(name) = &self.name {
            doc.name = name.clone();
        }
        if let Some(category) = &self.category {
            doc.category = category.clone();
        }
        if let Some(price) = self.price {
            doc.price = price;
        }
        if let Some(description) = &self.description {
            doc.description = description.clone();
        }
        if let Some(images) = &self.images {
            doc.images = images.clone();
        }
        if let Some(attributes) = &self.attributes {
            doc.attributes = attributes.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub const DEFAULT_FIELD: &'static str = "price";

    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn by_price(order: SortOrder) -> Self {
        Self::new(Self::DEFAULT_FIELD, order)
    }
}

/// Filter, sort and page over the index.
///
/// Filters live in a `BTreeMap` so the generated query is identical for
/// identical arguments. A price bound of zero or less means "unbounded".
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filters: BTreeMap<String, String>,
    pub sort: Option<Sort>,
    pub min_price: f64,
    pub max_price: f64,
    pub page: u64,
    pub limit: u64,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            sort: None,
            min_price: 0.0,
            max_price: 0.0,
            page: 1,
            limit: 10,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn price_range(mut self, min: f64, max: f64) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn paged(mut self, page: u64, limit: u64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Offset of the first hit. Pages start at 1.
    pub fn from(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}
