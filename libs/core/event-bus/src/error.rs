//! Bus error types and categorization.
//!
//! - **Transient**: broker or network trouble; the message may succeed later.
//! - **Permanent**: the message itself is unusable; retrying cannot help.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Settle failed: {0}")]
    Settle(String),

    /// Broker deliberately unreachable (in-memory outage switch).
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Malformed routing key or unknown verb.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BusError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BusError::Decode(_) | BusError::Serialization(_) => ErrorCategory::Permanent,
            BusError::Connection(_)
            | BusError::Publish(_)
            | BusError::Subscribe(_)
            | BusError::Settle(_)
            | BusError::Unavailable(_) => ErrorCategory::Transient,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.category() == ErrorCategory::Permanent
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}
