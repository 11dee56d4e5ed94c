//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;
use tripstore::{RecordInfo, StoreError, Versioned};

use super::Conversation;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conversation {id} changed concurrently (expected version {expected:?}, found {found:?})")]
    Conflict {
        id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Conversation {0} is locked by another writer")]
    Busy(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

impl StateError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::Conflict { .. })
    }

    /// A reload and recompute may succeed where this attempt failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StateError::Conflict { .. } | StateError::Busy(_))
    }
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                id, expected, found, ..
            } => StateError::Conflict { id, expected, found },
            StoreError::Busy { id, .. } => StateError::Busy(id),
            other => StateError::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    Load {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Versioned<Conversation>>>>,
    },
    Save {
        conversation: Box<Conversation>,
        expected_version: Option<u64>,
        reply: oneshot::Sender<StateResponse<u64>>,
    },
    List {
        reply: oneshot::Sender<StateResponse<Vec<RecordInfo>>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Shutdown
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err: StateError = StoreError::Conflict {
            collection: "conversations".to_string(),
            id: "c1".to_string(),
            expected: Some(1),
            found: Some(2),
        }
        .into();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn test_store_busy_is_retryable() {
        let err: StateError = StoreError::Busy {
            collection: "conversations".to_string(),
            id: "c1".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert!(!err.is_conflict());
    }
}
