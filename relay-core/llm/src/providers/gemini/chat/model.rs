use super::api::{GenerateContentRequest, GenerateContentResponse};
use crate::client::Client;
use crate::framing::JsonArrayDecoder;
use crate::providers::{require_key, text_deltas};
use crate::traffic_log;
use crate::{ChatModel, ChatRequest, DeltaStream, LlmError, ModelId, Vendor};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct GeminiChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: ModelId,
}

impl GeminiChatModel {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, model: ModelId) -> Self {
        GeminiChatModel {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn stream_url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    /// Without `alt=sse` the body is one JSON array delivered progressively,
    /// so objects are extracted by brace scanning rather than by line.
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError> {
        let api_key = require_key(&self.api_key, Vendor::Gemini)?;
        let model_name = self.model.as_str();
        let url = self.stream_url();

        let api_request = GenerateContentRequest::from(request);
        traffic_log::log_stream_start(model_name, &format!("{}?key=***", url), &api_request);

        let events = self
            .client
            .post_stream(
                &format!("{}?key={}", url, api_key),
                HeaderMap::new(),
                &api_request,
                JsonArrayDecoder::<GenerateContentResponse>::new(),
                cancel,
            )
            .await
            .inspect_err(|e| traffic_log::log_failure(model_name, e))?;

        Ok(text_deltas(
            events,
            model_name.to_string(),
            GenerateContentResponse::into_delta,
        ))
    }
}
