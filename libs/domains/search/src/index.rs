use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentPatch, SearchDocument, SearchRequest};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Document {0} not found")]
    DocumentMissing(i64),

    #[error("Failed to decode index response: {0}")]
    Decode(String),

    #[error("Index unavailable")]
    Unavailable,
}

impl IndexError {
    /// Worth another attempt later: the index was unreachable or failing.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Unavailable => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::DocumentMissing(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IndexError::Decode(err.to_string())
        } else {
            IndexError::Transport(err.to_string())
        }
    }
}

/// Secondary, query-optimized product store.
///
/// Writes are keyed by product id and idempotent, so replaying a message is
/// always safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Creates or fully replaces the document.
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError>;

    /// Sets the supplied fields. `DocumentMissing` when the document does not exist.
    async fn patch(&self, patch: &DocumentPatch) -> Result<(), IndexError>;

    /// Deleting a missing document succeeds.
    async fn delete(&self, id: i64) -> Result<(), IndexError>;

    async fn get(&self, id: i64) -> Result<Option<SearchDocument>, IndexError>;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(IndexError::Transport("reset".into()).is_transient());
        assert!(IndexError::Unavailable.is_transient());
        assert!(
            IndexError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !IndexError::Status {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!IndexError::DocumentMissing(1).is_transient());
    }
}
