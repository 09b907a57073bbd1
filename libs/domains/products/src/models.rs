use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Product record as held by the primary store.
///
/// `stock` is authoritative here and nowhere else: caches and the search
/// index only ever see a [`ProductView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Product {
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    pub id: i64,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[validate(range(exclusive_min = 0.0, message = "price must be greater than zero"))]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i64,
    /// Image URLs in display order.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: Map<String, Value>,
}

/// Externally visible projection of a [`Product`], without `stock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
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

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            category: product.category,
            price: product.price,
            description: product.description,
            images: product.images,
            attributes: product.attributes,
        }
    }
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        product.clone().into()
    }
}

/// Sparse update: only the fields that are `Some` change.
///
/// Unknown keys (including `stock` and `id`) are rejected when decoding, so
/// stock can only move through the stock endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0, message = "price must be greater than zero"))]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.images.is_none()
            && self.attributes.is_none()
    }

    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(images) = &self.images {
            product.images = images.clone();
        }
        if let Some(attributes) = &self.attributes {
            product.attributes = attributes.clone();
        }
    }
}

/// Body of the add-stock and reduce-stock endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockChange {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockLevel {
    pub id: i64,
    pub stock: i64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

/// Query string of `GET /api/v1/products`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget() -> Product {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Widget",
            "category": "tools",
            "price": 100.0,
            "stock": 10
        }))
        .unwrap()
    }

    #[test]
    fn test_view_never_carries_stock() {
        let view = ProductView::from(widget());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("stock").is_none());
        assert_eq!(json["name"], "Widget");
    }

    #[test]
    fn test_product_validation() {
        assert!(widget().validate().is_ok());

        let mut bad = widget();
        bad.price = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = widget();
        bad.id = 0;
        assert!(bad.validate().is_err());

        let mut bad = widget();
        bad.stock = -1;
        assert!(bad.validate().is_err());

        let mut bad = widget();
        bad.name.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_serializes_only_supplied_fields() {
        let patch = ProductPatch {
            price: Some(150.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "price": 150.0 }));
        assert!(!patch.is_empty());
        assert!(ProductPatch::default().is_empty());
    }

    #[test]
    fn test_patch_rejects_stock_and_unknown_fields() {
        assert!(serde_json::from_value::<ProductPatch>(json!({ "stock": 5 })).is_err());
        assert!(serde_json::from_value::<ProductPatch>(json!({ "id": 2, "name": "x" })).is_err());
        assert!(serde_json::from_value::<ProductPatch>(json!({ "name": "x" })).is_ok());
    }

    #[test]
    fn test_patch_apply_leaves_other_fields() {
        let mut product = widget();
        ProductPatch {
            price: Some(150.0),
            ..Default::default()
        }
        .apply_to(&mut product);

        assert_eq!(product.price, 150.0);
        assert_eq!(product.name, "Widget");
        assert_eq!(product.stock, 10);
    }

    #[test]
    fn test_category_query_defaults() {
        let query: CategoryQuery = serde_json::from_value(json!({ "category": "tools" })).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert!(query.validate().is_ok());

        let query: CategoryQuery =
            serde_json::from_value(json!({ "category": "tools", "limit": 101 })).unwrap();
        assert!(query.validate().is_err());
    }
}
