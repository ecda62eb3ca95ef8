use serde::Serialize;

use crate::storage::{ConversationId, MessageId};

/// User-facing text of the terminal error event. Vendor detail stays in the logs.
pub const GENERIC_ERROR: &str = "Failed to generate response";

/// One event on the client channel of a generation.
///
/// Order is `Started`, any number of `Delta`, then at most one of `Done` or
/// `Error`. A cancelled generation ends without a terminal event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerationEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        message_id: MessageId,
        conversation_id: ConversationId,
    },
    Delta {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        conversation_id: ConversationId,
        done: bool,
    },
    Error {
        error: String,
    },
}

impl GenerationEvent {
    pub fn done(conversation_id: ConversationId) -> Self {
        GenerationEvent::Done {
            conversation_id,
            done: true,
        }
    }

    pub fn error() -> Self {
        GenerationEvent::Error {
            error: GENERIC_ERROR.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Done { .. } | GenerationEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let message_id = MessageId::from_string("m1");
        let conversation_id = ConversationId::from_string("c1");

        assert_eq!(
            serde_json::to_value(GenerationEvent::Started {
                message_id,
                conversation_id: conversation_id.clone(),
            })
            .unwrap(),
            json!({"messageId": "m1", "conversationId": "c1"})
        );
        assert_eq!(
            serde_json::to_value(GenerationEvent::Delta {
                content: "Hi".into()
            })
            .unwrap(),
            json!({"content": "Hi"})
        );
        assert_eq!(
            serde_json::to_value(GenerationEvent::done(conversation_id)).unwrap(),
            json!({"conversationId": "c1", "done": true})
        );
        assert_eq!(
            serde_json::to_value(GenerationEvent::error()).unwrap(),
            json!({"error": "Failed to generate response"})
        );
    }
}
