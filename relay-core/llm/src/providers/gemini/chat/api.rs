use serde::{Deserialize, Serialize};

use crate::{ChatRequest, LlmError, MediaSource};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

impl From<crate::Role> for Role {
    fn from(value: crate::Role) -> Self {
        match value {
            crate::Role::Assistant => Role::Model,
            crate::Role::User | crate::Role::System => Role::User,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileData {
    pub(crate) mime_type: String,
    pub(crate) file_uri: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Part {
    Text(String),
    InlineData(InlineData),
    FileData(FileData),
}

impl From<&MediaSource> for Part {
    fn from(source: &MediaSource) -> Self {
        match source {
            MediaSource::Base64 { mime_type, data } => Part::InlineData(InlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            MediaSource::Url { mime_type, url } => Part::FileData(FileData {
                mime_type: mime_type.clone(),
                file_uri: url.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Content {
    pub(crate) role: Role,
    pub(crate) parts: Vec<Part>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct SystemInstruction {
    pub(crate) parts: Vec<Part>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub(crate) max_output_tokens: u32,
    pub(crate) temperature: f32,
    pub(crate) top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            max_output_tokens: 2048,
            temperature: 0.9,
            top_p: 0.95,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<SystemInstruction>,
    pub(crate) generation_config: GenerationConfig,
}

/// A merged turn before it is turned into parts.
struct Turn {
    role: Role,
    text: String,
    media: Vec<Part>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    /// Consecutive messages with the same role are merged into one turn,
    /// texts joined by a blank line. Turns left without any part are dropped.
    fn from(request: &ChatRequest) -> Self {
        let mut turns: Vec<Turn> = Vec::new();
        for msg in request.conversation() {
            let role = Role::from(msg.role);
            let text = msg.get_text();
            let media: Vec<Part> = msg
                .payload
                .content
                .iter()
                .filter_map(|block| match block {
                    crate::ContentBlock::Image { source } | crate::ContentBlock::Document { source } => {
                        Some(Part::from(source))
                    }
                    crate::ContentBlock::Text { .. } => None,
                })
                .collect();

            match turns.last_mut() {
                Some(turn) if turn.role == role => {
                    turn.text = format!("{}\n\n{}", turn.text, text).trim().to_string();
                    turn.media.extend(media);
                }
                _ => turns.push(Turn { role, text, media }),
            }
        }

        let contents = turns
            .into_iter()
            .filter_map(|turn| {
                let mut parts = Vec::new();
                if !turn.text.trim().is_empty() {
                    parts.push(Part::Text(turn.text));
                }
                parts.extend(turn.media);
                (!parts.is_empty()).then_some(Content {
                    role: turn.role,
                    parts,
                })
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: request.system_prompt().map(|text| SystemInstruction {
                parts: vec![Part::Text(text)],
            }),
            generation_config: GenerationConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) error: Option<ApiError>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub(crate) content: Option<CandidateContent>,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<ResponsePart>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ResponsePart {
    pub(crate) text: Option<String>,
    pub(crate) thought: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct ApiError {
    pub(crate) code: Option<u16>,
    pub(crate) message: String,
    pub(crate) status: Option<String>,
}

impl GenerateContentResponse {
    pub(crate) fn into_delta(self) -> Option<Result<String, LlmError>> {
        if let Some(error) = self.error {
            return Some(Err(LlmError::Vendor(error.message)));
        }
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| p.thought != Some(true))
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();
        Some(Ok(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, ChatPayload, ContentBlock};

    #[test]
    fn test_consecutive_roles_are_merged() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("one"),
            ChatMessage::user("two"),
            ChatMessage::assistant("three"),
            ChatMessage::assistant(""),
            ChatMessage::user(ChatPayload::new(vec![
                ContentBlock::Text { text: "see".into() },
                ContentBlock::Image {
                    source: MediaSource::Base64 {
                        mime_type: "image/png".into(),
                        data: "AAAA".into(),
                    },
                },
                ContentBlock::Document {
                    source: MediaSource::Url {
                        mime_type: "application/pdf".into(),
                        url: "https://example.com/big.pdf".into(),
                    },
                },
            ])),
        ]);
        let json = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "one\n\ntwo");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "three");
        assert_eq!(contents[2]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            contents[2]["parts"][2]["fileData"]["fileUri"],
            "https://example.com/big.pdf"
        );
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_response_text_extraction() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"thinking","thought":true},{"text":"Hi"}],"role":"model"},"index":0}],"usageMetadata":{"promptTokenCount":3}}"#,
        )
        .unwrap();
        assert_eq!(chunk.into_delta().unwrap().unwrap(), "Hi");

        let finish_only: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap();
        assert_eq!(finish_only.into_delta().unwrap().unwrap(), "");
    }

    #[test]
    fn test_in_band_error() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap();
        assert!(matches!(chunk.into_delta(), Some(Err(LlmError::Vendor(_)))));
    }
}
