//! StateManager - actor that owns the trip store
//!
//! Processes commands via channels so every conversation read and write goes
//! through a single owner of the SQLite connection.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use tripstore::{RecordInfo, Store, Versioned};

use super::messages::{StateCommand, StateError, StateResponse};
use super::{CONVERSATIONS, Conversation, ConversationStore};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_dir`
    pub fn spawn(store_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_dir = %store_dir.as_ref().display(), "spawn: called");
        let store = Store::open(store_dir.as_ref())?;
        Ok(Self::with_store(store))
    }

    /// Spawn the actor over an already opened store
    pub fn with_store(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// List stored conversations
    pub async fn list(&self) -> StateResponse<Vec<RecordInfo>> {
        debug!("list: called");
        self.request(|reply| StateCommand::List { reply }).await
    }

    /// Delete a conversation; `false` when it did not exist
    pub async fn delete(&self, id: &str) -> StateResponse<bool> {
        debug!(%id, "delete: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::Delete { id, reply }).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl ConversationStore for StateManager {
    async fn load(&self, id: &str) -> StateResponse<Option<Versioned<Conversation>>> {
        debug!(%id, "StateManager::load: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::Load { id, reply }).await
    }

    async fn save(&self, conversation: &Conversation, expected_version: Option<u64>) -> StateResponse<u64> {
        debug!(id = %conversation.id, ?expected_version, "StateManager::save: called");
        let conversation = Box::new(conversation.clone());
        self.request(|reply| StateCommand::Save {
            conversation,
            expected_version,
            reply,
        })
        .await
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Load { id, reply } => {
                debug!(%id, "actor_loop: Load command");
                let result = store.get::<Conversation>(CONVERSATIONS, &id).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::Save {
                conversation,
                expected_version,
                reply,
            } => {
                debug!(id = %conversation.id, ?expected_version, "actor_loop: Save command");
                let result = store
                    .put(CONVERSATIONS, &conversation.id, conversation.as_ref(), expected_version)
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::List { reply } => {
                debug!("actor_loop: List command");
                let _ = reply.send(store.list(CONVERSATIONS).map_err(StateError::from));
            }

            StateCommand::Delete { id, reply } => {
                debug!(%id, "actor_loop: Delete command");
                let _ = reply.send(store.delete(CONVERSATIONS, &id).map_err(StateError::from));
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_manager_save_and_load() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        assert!(manager.load("c1").await.unwrap().is_none());

        let mut conversation = Conversation::new("c1");
        let v1 = manager.save(&conversation, None).await.unwrap();
        assert_eq!(v1, 1);

        conversation.dialogue.trip.destination = Some("Ella".to_string());
        let v2 = manager.save(&conversation, Some(v1)).await.unwrap();
        assert_eq!(v2, 2);

        let loaded = manager.load("c1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.value.dialogue.trip.destination.as_deref(), Some("Ella"));

        assert_eq!(manager.list().await.unwrap().len(), 1);
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_detects_stale_write() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());
        let conversation = Conversation::new("c1");
        let v1 = manager.save(&conversation, None).await.unwrap();
        manager.save(&conversation, Some(v1)).await.unwrap();

        let err = manager.save(&conversation, Some(v1)).await.unwrap_err();
        assert!(err.is_conflict());

        let err = manager.save(&Conversation::new("c1"), None).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_state_manager_delete() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());
        manager.save(&Conversation::new("gone"), None).await.unwrap();
        assert!(manager.delete("gone").await.unwrap());
        assert!(!manager.delete("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_actor_reports_channel_error() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());
        manager.shutdown().await.unwrap();
        tokio::task::yield_now().await;
        let err = manager.load("c1").await.unwrap_err();
        assert!(matches!(err, StateError::ChannelError));
    }
}
