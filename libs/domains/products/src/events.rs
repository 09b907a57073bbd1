//! Domain events published after a successful store write.
//!
//! Payloads are self-describing so a consumer never has to read the store:
//!
//! | routing key       | payload                          |
//! |-------------------|----------------------------------|
//! | `product.created` | full [`Product`]                 |
//! | `product.updated` | supplied patch fields plus `id`  |
//! | `product.deleted` | `{"id": <id>}`                   |

use event_bus::{RoutingKey, Verb};
use serde::Serialize;

use crate::models::{Product, ProductPatch};

pub const PRODUCT_ENTITY: &str = "product";

#[derive(Debug, Clone, PartialEq)]
pub enum ProductEvent {
    Created(Product),
    Updated { id: i64, patch: ProductPatch },
    Deleted { id: i64 },
}

#[derive(Serialize)]
struct UpdatedPayload<'a> {
    id: i64,
    #[serde(flatten)]
    patch: &'a ProductPatch,
}

#[derive(Serialize)]
struct DeletedPayload {
    id: i64,
}

impl ProductEvent {
    pub fn verb(&self) -> Verb {
        match self {
            Self::Created(_) => Verb::Created,
            Self::Updated { .. } => Verb::Updated,
            Self::Deleted { .. } => Verb::Deleted,
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(PRODUCT_ENTITY, self.verb())
    }

    pub fn product_id(&self) -> i64 {
        match self {
            Self::Created(product) => product.id,
            Self::Updated { id, .. } | Self::Deleted { id } => *id,
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Created(product) => serde_json::to_vec(product),
            Self::Updated { id, patch } => serde_json::to_vec(&UpdatedPayload { id: *id, patch }),
            Self::Deleted { id } => serde_json::to_vec(&DeletedPayload { id: *id }),
        }
    }
}
