use super::api::{ChatCompletionRequest, StreamChunk};
use crate::client::Client;
use crate::framing::SseDecoder;
use crate::providers::{bearer_headers, require_key, text_deltas};
use crate::traffic_log;
use crate::{ChatModel, ChatRequest, DeltaStream, LlmError, ModelId, Vendor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct OpenAIChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: ModelId,
}

impl OpenAIChatModel {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, model: ModelId) -> Self {
        OpenAIChatModel {
            client,
            base_url,
            api_key,
            model,
        }
    }
}

/// Shared by every Chat Completions compatible vendor.
pub(crate) async fn stream_completion(
    client: &Client,
    base_url: &str,
    api_key: &str,
    model_name: &str,
    request: &ChatRequest,
    cancel: CancellationToken,
) -> Result<DeltaStream, LlmError> {
    let url = format!("{}/chat/completions", base_url);
    let api_request = ChatCompletionRequest::from_chat_request(model_name, request);
    traffic_log::log_stream_start(model_name, &url, &api_request);

    let events = client
        .post_stream(
            &url,
            bearer_headers(api_key)?,
            &api_request,
            SseDecoder::<StreamChunk>::new(),
            cancel,
        )
        .await
        .inspect_err(|e| traffic_log::log_failure(model_name, e))?;

    Ok(text_deltas(events, model_name.to_string(), StreamChunk::into_delta))
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    fn vendor(&self) -> Vendor {
        Vendor::OpenAI
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError> {
        let api_key = require_key(&self.api_key, Vendor::OpenAI)?;
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
