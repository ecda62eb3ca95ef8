use serde::{Deserialize, Serialize};

use crate::{ChatRequest, LlmError, MediaSource, Role};

pub(crate) const MAX_TOKENS: u32 = 2048;

#[derive(Clone, Debug, Serialize)]
pub(crate) struct MessagesRequest {
    pub(crate) model: String,
    pub(crate) max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system: Option<String>,
    pub(crate) messages: Vec<Message>,
    pub(crate) stream: bool,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Message {
    pub(crate) role: &'static str,
    pub(crate) content: Vec<ContentBlock>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    Text { text: String },
    Image { source: Source },
    Document { source: Source },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Source {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

impl From<&MediaSource> for Source {
    fn from(source: &MediaSource) -> Self {
        match source {
            MediaSource::Base64 { mime_type, data } => Source::Base64 {
                media_type: mime_type.clone(),
                data: data.clone(),
            },
            MediaSource::Url { url, .. } => Source::Url { url: url.clone() },
        }
    }
}

impl From<&crate::ContentBlock> for Option<ContentBlock> {
    fn from(block: &crate::ContentBlock) -> Self {
        match block {
            crate::ContentBlock::Text { text } if text.trim().is_empty() => None,
            crate::ContentBlock::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
            crate::ContentBlock::Image { source } => Some(ContentBlock::Image {
                source: source.into(),
            }),
            crate::ContentBlock::Document { source } => Some(ContentBlock::Document {
                source: source.into(),
            }),
        }
    }
}

impl MessagesRequest {
    /// Empty messages are rejected by the Messages API, so they are dropped.
    pub(crate) fn from_chat_request(model: &str, request: &ChatRequest) -> Self {
        let messages = request
            .conversation()
            .filter_map(|msg| {
                let content: Vec<ContentBlock> = msg
                    .payload
                    .content
                    .iter()
                    .filter_map(|block| Option::<ContentBlock>::from(block))
                    .collect();
                if content.is_empty() {
                    return None;
                }
                let role = match msg.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                };
                Some(Message { role, content })
            })
            .collect();

        MessagesRequest {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            system: request.system_prompt(),
            messages,
            stream: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum StreamEvent {
    ContentBlockDelta { index: usize, delta: Delta },
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ApiError {
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) message: String,
}

impl StreamEvent {
    pub(crate) fn into_delta(self) -> Option<Result<String, LlmError>> {
        match self {
            StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
                ..
            } => Some(Ok(text)),
            StreamEvent::Error { error } => Some(Err(LlmError::Vendor(format!(
                "{}: {}",
                error.error_type, error.message
            )))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, ChatPayload};

    #[test]
    fn test_request_shape() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant(""),
            ChatMessage::user(ChatPayload::new(vec![
                crate::ContentBlock::Text { text: "look".into() },
                crate::ContentBlock::Image {
                    source: MediaSource::Url {
                        mime_type: "image/png".into(),
                        url: "https://cdn.example.com/a.png".into(),
                    },
                },
                crate::ContentBlock::Document {
                    source: MediaSource::Base64 {
                        mime_type: "application/pdf".into(),
                        data: "JVBE".into(),
                    },
                },
            ])),
        ]);
        let json = serde_json::to_value(MessagesRequest::from_chat_request(
            "claude-sonnet-4-20250514",
            &request,
        ))
        .unwrap();

        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["system"], "be brief");
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2, "empty assistant turn is stripped");
        let blocks = messages[1]["content"].as_array().unwrap();
        assert_eq!(blocks[1]["source"]["type"], "url");
        assert_eq!(blocks[2]["type"], "document");
        assert_eq!(blocks[2]["source"]["media_type"], "application/pdf");
    }

    #[test]
    fn test_only_text_deltas_yield_text() {
        let events = [
            r#"{"type":"message_start","message":{"id":"m"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let texts: Vec<String> = events
            .iter()
            .filter_map(|e| serde_json::from_str::<StreamEvent>(e).unwrap().into_delta())
            .map(Result::unwrap)
            .collect();

        assert_eq!(texts, vec!["Hi".to_string()]);
    }

    #[test]
    fn test_error_event() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap();
        assert!(matches!(event.into_delta(), Some(Err(LlmError::Vendor(_)))));
    }
}
