//! In-memory store
//!
//! Backs tests and `--in-memory` server runs. A single mutex guards all
//! tables so status transitions are atomic with respect to each other.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::storage::helper::unix_timestamp;
use crate::storage::ids::{ConversationId, MessageId, UserId};
use crate::storage::traits::{AttachmentStore, ConversationStore, MessageStore};
use crate::storage::types::{Attachment, Conversation, Message, MessageStatus};

#[derive(Debug, Default)]
struct Tables {
    conversations: HashMap<ConversationId, Conversation>,
    /// Insertion order doubles as the tie-breaker for equal timestamps.
    messages: Vec<Message>,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Number of stored messages across all conversations.
    pub fn message_count(&self) -> Result<usize> {
        Ok(self.tables()?.messages.len())
    }

    pub fn conversation_count(&self) -> Result<usize> {
        Ok(self.tables()?.conversations.len())
    }
}

fn find_message<'a>(tables: &'a mut Tables, id: &MessageId) -> Option<&'a mut Message> {
    tables.messages.iter_mut().find(|m| &m.id == id)
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, user_id: &UserId, title: &str) -> Result<Conversation> {
        let now = unix_timestamp();
        let conversation = Conversation {
            id: ConversationId::new(),
            user_id: user_id.clone(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables()?
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.tables()?.conversations.get(id).cloned())
    }

    async fn touch_conversation(&self, id: &ConversationId) -> Result<()> {
        if let Some(conversation) = self.tables()?.conversations.get_mut(id) {
            conversation.updated_at = unix_timestamp();
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.messages.iter().any(|m| m.id == message.id) {
            return Err(anyhow!("message {} already exists", message.id));
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self.tables()?.messages.iter().find(|m| &m.id == id).cloned())
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let tables = self.tables()?;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn update_message_content(&self, id: &MessageId, content: &str) -> Result<()> {
        let mut tables = self.tables()?;
        let message = find_message(&mut tables, id).ok_or_else(|| anyhow!("message {} not found", id))?;
        message.content = content.to_string();
        message.updated_at = unix_timestamp();
        Ok(())
    }

    async fn set_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<()> {
        let mut tables = self.tables()?;
        let message = find_message(&mut tables, id).ok_or_else(|| anyhow!("message {} not found", id))?;
        message.status = status;
        message.updated_at = unix_timestamp();
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &MessageId,
        from: MessageStatus,
        to: MessageStatus,
    ) -> Result<bool> {
        let mut tables = self.tables()?;
        match find_message(&mut tables, id) {
            Some(message) if message.status == from => {
                message.status = to;
                message.updated_at = unix_timestamp();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_message(
        &self,
        id: &MessageId,
        content: &str,
        status: MessageStatus,
    ) -> Result<()> {
        let mut tables = self.tables()?;
        let message = find_message(&mut tables, id).ok_or_else(|| anyhow!("message {} not found", id))?;
        message.content = content.to_string();
        message.status = status;
        message.updated_at = unix_timestamp();
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<()> {
        let mut tables = self.tables()?;
        tables.messages.retain(|m| &m.id != id);
        tables
            .attachments
            .retain(|a| a.message_id.as_ref() != Some(id));
        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for MemoryStore {
    async fn link_attachments(
        &self,
        message_id: &MessageId,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut tables = self.tables()?;
        for attachment in attachments {
            let mut linked = attachment.clone();
            linked.message_id = Some(message_id.clone());
            match tables.attachments.iter().position(|a| a.id == attachment.id) {
                Some(index) => tables.attachments[index].message_id = Some(message_id.clone()),
                None => tables.attachments.push(linked),
            }
        }
        Ok(())
    }

    async fn list_attachments(&self, message_id: &MessageId) -> Result<Vec<Attachment>> {
        Ok(self
            .tables()?
            .attachments
            .iter()
            .filter(|a| a.message_id.as_ref() == Some(message_id))
            .cloned()
            .collect())
    }
}
