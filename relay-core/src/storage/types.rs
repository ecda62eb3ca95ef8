//! Row types shared by every store implementation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::helper::unix_timestamp;
use super::ids::{AttachmentId, ConversationId, MessageId, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(anyhow::anyhow!("unknown message role: {}", other)),
        }
    }
}

/// Lifecycle of an assistant message. User messages are always `Complete`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Streaming,
    Complete,
    Incomplete,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Streaming => "streaming",
            MessageStatus::Complete => "complete",
            MessageStatus::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streaming" => Ok(MessageStatus::Streaming),
            "complete" => Ok(MessageStatus::Complete),
            "incomplete" => Ok(MessageStatus::Incomplete),
            other => Err(anyhow::anyhow!("unknown message status: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    /// Model that produced an assistant message.
    pub model: Option<String>,
    pub status: MessageStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        let now = unix_timestamp();
        Message {
            id: MessageId::new(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            model: None,
            status: MessageStatus::Complete,
            created_at: now,
            updated_at: now,
        }
    }

    /// An empty assistant row in `Streaming` state, created before the first
    /// token so that a stable identifier exists for cancellation.
    pub fn placeholder(conversation_id: ConversationId, model: impl Into<String>) -> Self {
        let now = unix_timestamp();
        Message {
            id: MessageId::new(),
            conversation_id,
            role: MessageRole::Assistant,
            content: String::new(),
            model: Some(model.into()),
            status: MessageStatus::Streaming,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Metadata for an uploaded file. The bytes live at `locator`, which is
/// either a path under the public uploads directory (`/uploads/...`) or an
/// absolute URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(alias = "name")]
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(alias = "url")]
    pub locator: String,
    #[serde(default = "unix_timestamp")]
    pub created_at: i64,
}

impl Attachment {
    pub fn new(
        id: AttachmentId,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        locator: impl Into<String>,
    ) -> Self {
        Attachment {
            id,
            message_id: None,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size,
            locator: locator.into(),
            created_at: unix_timestamp(),
        }
    }
}
