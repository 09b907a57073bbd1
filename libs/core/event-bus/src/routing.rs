//! Typed `"<entity>.<verb>"` routing keys.

use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use crate::error::BusError;

/// Lifecycle verb carried in the second routing-key word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    entity: String,
    verb: Verb,
}

impl RoutingKey {
    pub fn new(entity: impl Into<String>, verb: Verb) -> Self {
        Self {
            entity: entity.into(),
            verb,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Fails with [`BusError::Decode`] when the key has no entity, no verb,
    /// or a verb outside [`Verb`].
    pub fn parse(raw: &str) -> Result<Self, BusError> {
        let (entity, verb) = raw
            .split_once('.')
            .ok_or_else(|| BusError::Decode(format!("routing key '{raw}' has no verb")))?;

        if entity.is_empty() {
            return Err(BusError::Decode(format!(
                "routing key '{raw}' has no entity"
            )));
        }

        let verb = Verb::from_str(verb)
            .map_err(|_| BusError::Decode(format!("unknown verb '{verb}' in '{raw}'")))?;

        Ok(Self::new(entity, verb))
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.verb)
    }
}

impl FromStr for RoutingKey {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
