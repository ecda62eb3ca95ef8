//! Chat Completions wire types. Groq serves the same protocol.

use serde::{Deserialize, Serialize};

use crate::{ChatRequest, ContentBlock, LlmError, Role};

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<Message>,
    pub(crate) stream: bool,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Message {
    pub(crate) role: &'static str,
    pub(crate) content: MessageContent,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub(crate) url: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

impl ChatCompletionRequest {
    /// System instructions become one leading `system` message. Messages
    /// with media are sent as content parts; documents have no Chat
    /// Completions representation and are left out.
    pub(crate) fn from_chat_request(model: &str, request: &ChatRequest) -> Self {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt() {
            messages.push(Message {
                role: "system",
                content: MessageContent::Text(system),
            });
        }

        for msg in request.conversation() {
            let content = if msg.payload.has_media() {
                let parts = msg
                    .payload
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } if !text.is_empty() => {
                            Some(ContentPart::Text { text: text.clone() })
                        }
                        ContentBlock::Image { source } => Some(ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: source.to_url(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                MessageContent::Parts(parts)
            } else {
                MessageContent::Text(msg.get_text())
            };
            messages.push(Message {
                role: role_name(msg.role),
                content,
            });
        }

        ChatCompletionRequest {
            model: model.to_string(),
            messages,
            stream: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<StreamChoice>,
    pub(crate) error: Option<ApiError>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub(crate) delta: Delta,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct Delta {
    pub(crate) content: Option<String>,
    pub(crate) text: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ApiError {
    pub(crate) message: String,
    #[serde(rename = "type")]
    pub(crate) error_type: Option<String>,
}

impl StreamChunk {
    pub(crate) fn into_delta(self) -> Option<Result<String, LlmError>> {
        if let Some(error) = self.error {
            return Some(Err(LlmError::Vendor(error.message)));
        }
        let text: String = self
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content.or(c.delta.text))
            .collect();
        Some(Ok(text))
    }
}
