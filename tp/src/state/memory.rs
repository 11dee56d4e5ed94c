//! In-process conversation store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use tripstore::Versioned;

use super::messages::{StateError, StateResponse};
use super::{Conversation, ConversationStore};

/// Conversation store kept in memory, with the same version checks as the SQLite store
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Versioned<Conversation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, id: &str) -> StateResponse<Option<Versioned<Conversation>>> {
        debug!(%id, "MemoryStore::load: called");
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn save(&self, conversation: &Conversation, expected_version: Option<u64>) -> StateResponse<u64> {
        debug!(id = %conversation.id, ?expected_version, "MemoryStore::save: called");
        let mut records = self.records.lock().await;
        let found = records.get(&conversation.id).map(|r| r.version);
        if found != expected_version {
            return Err(StateError::Conflict {
                id: conversation.id.clone(),
                expected: expected_version,
                found,
            });
        }
        let version = found.unwrap_or(0) + 1;
        records.insert(
            conversation.id.clone(),
            Versioned {
                version,
                updated_at: Utc::now().timestamp_millis(),
                value: conversation.clone(),
            },
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_versions() {
        let store = MemoryStore::new();
        let conversation = Conversation::new("m1");
        assert_eq!(store.save(&conversation, None).await.unwrap(), 1);
        assert_eq!(store.save(&conversation, Some(1)).await.unwrap(), 2);
        assert!(store.save(&conversation, Some(1)).await.unwrap_err().is_conflict());
        assert_eq!(store.load("m1").await.unwrap().unwrap().version, 2);
        assert!(store.load("missing").await.unwrap().is_none());
    }
}
