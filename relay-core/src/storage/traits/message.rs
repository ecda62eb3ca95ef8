//! MessageStore trait for message rows and their status lifecycle

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::types::{Message, MessageStatus};

/// Message persistence.
///
/// A streaming row has a single writer (the generation that owns it), so
/// content updates are plain overwrites. Status changes that can race with
/// another request go through [`MessageStore::transition_status`].
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> Result<()>;

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>>;

    /// All messages of a conversation, oldest first. Rows created in the
    /// same millisecond keep their insertion order.
    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>>;

    /// Replace the content buffer of a message.
    async fn update_message_content(&self, id: &MessageId, content: &str) -> Result<()>;

    async fn set_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<()>;

    /// Atomically move `id` from `from` to `to`. Returns false, changing
    /// nothing, when the current status is not `from` or the row is gone.
    async fn transition_status(
        &self,
        id: &MessageId,
        from: MessageStatus,
        to: MessageStatus,
    ) -> Result<bool>;

    /// Write final content and status in one update.
    async fn finalize_message(
        &self,
        id: &MessageId,
        content: &str,
        status: MessageStatus,
    ) -> Result<()>;

    async fn delete_message(&self, id: &MessageId) -> Result<()>;
}
