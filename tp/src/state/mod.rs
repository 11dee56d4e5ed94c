//! Conversation persistence
//!
//! [`ConversationStore`] is the seam the orchestrator saves through. The
//! [`StateManager`] actor owns the SQLite-backed store and processes messages
//! via channels; [`MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use tripstore::Versioned;

mod conversation;
mod manager;
mod memory;
mod messages;

pub use conversation::{Conversation, Speaker, Turn};
pub use manager::StateManager;
pub use memory::MemoryStore;
pub use messages::{StateCommand, StateError, StateResponse};

/// Store collection holding conversation records
pub const CONVERSATIONS: &str = "conversations";

/// Versioned load/save of conversation records
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &str) -> StateResponse<Option<Versioned<Conversation>>>;

    /// Save `conversation`; fails with [`StateError::Conflict`] unless the
    /// stored version still equals `expected_version` (`None` = must not exist)
    async fn save(&self, conversation: &Conversation, expected_version: Option<u64>) -> StateResponse<u64>;
}
