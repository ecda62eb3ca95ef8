//! ConversationStore trait for conversation lifecycle operations

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::{ConversationId, UserId};
use crate::storage::types::Conversation;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, user_id: &UserId, title: &str) -> Result<Conversation>;

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Bump `updated_at` to now.
    async fn touch_conversation(&self, id: &ConversationId) -> Result<()>;
}
