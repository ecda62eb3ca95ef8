//! Groq speaks the Chat Completions protocol, so the wire types and stream
//! decoding come from the OpenAI adapter.

use crate::client::Client;
use crate::providers::openai::chat::stream_completion;
use crate::providers::require_key;
use crate::{ChatModel, ChatRequest, DeltaStream, LlmError, ModelId, Vendor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct GroqChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: ModelId,
}

impl GroqChatModel {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, model: ModelId) -> Self {
        GroqChatModel {
            client,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatModel for GroqChatModel {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    fn vendor(&self) -> Vendor {
        Vendor::Groq
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError> {
        let api_key = require_key(&self.api_key, Vendor::Groq)?;
        stream_completion(
            &self.client,
            &self.base_url,
            api_key,
            self.model.as_str(),
            request,
            cancel,
        )
        .await
    }
}
