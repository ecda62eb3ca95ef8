use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

/// Where the bytes of an attachment live once they reach an adapter.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    Base64 { mime_type: String, data: String },
    Url { mime_type: String, url: String },
}

impl MediaSource {
    pub fn mime_type(&self) -> &str {
        match self {
            MediaSource::Base64 { mime_type, .. } | MediaSource::Url { mime_type, .. } => {
                mime_type
            }
        }
    }

    /// Render as a `data:` URL for inline sources, or the plain URL otherwise.
    pub fn to_url(&self) -> String {
        match self {
            MediaSource::Base64 { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
            MediaSource::Url { url, .. } => url.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: MediaSource },
    Document { source: MediaSource },
}

#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ChatPayload {
    pub content: Vec<ContentBlock>,
}

impl From<String> for ChatPayload {
    fn from(text: String) -> Self {
        ChatPayload::text(text)
    }
}

impl From<&str> for ChatPayload {
    fn from(text: &str) -> Self {
        ChatPayload::text(text)
    }
}

impl ChatPayload {
    pub fn new(content: Vec<ContentBlock>) -> Self {
        ChatPayload { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ChatPayload {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn get_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_media(&self) -> bool {
        self.content
            .iter()
            .any(|block| !matches!(block, ContentBlock::Text { .. }))
    }

    /// True when there is neither text nor media worth sending.
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|block| match block {
            ContentBlock::Text { text } => text.trim().is_empty(),
            _ => false,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub payload: ChatPayload,
}

impl ChatMessage {
    pub fn new(role: Role, payload: ChatPayload) -> Self {
        Self { role, payload }
    }

    pub fn user(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::User, payload.into())
    }

    pub fn assistant(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::Assistant, payload.into())
    }

    pub fn system(payload: impl Into<ChatPayload>) -> Self {
        Self::new(Role::System, payload.into())
    }

    pub fn get_text(&self) -> String {
        self.payload.get_text()
    }
}

/// A normalized conversation handed to an adapter. System instructions are
/// carried as `Role::System` messages; each adapter lifts them into whatever
/// slot its vendor expects.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        ChatRequest { messages }
    }

    /// Concatenated text of every system message, if any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.get_text())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages with the system instructions removed.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}
