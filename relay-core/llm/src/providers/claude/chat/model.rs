use super::api::{MessagesRequest, StreamEvent};
use crate::client::Client;
use crate::framing::SseDecoder;
use crate::providers::{require_key, text_deltas};
use crate::traffic_log;
use crate::{ChatModel, ChatRequest, DeltaStream, LlmError, ModelId, Vendor};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: ModelId,
}

impl ClaudeChatModel {
    pub fn new(client: Client, base_url: String, api_key: Option<String>, model: ModelId) -> Self {
        ClaudeChatModel {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let api_key = require_key(&self.api_key, Vendor::Anthropic)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| LlmError::InvalidRequest("invalid API key format".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(headers)
    }
}

#[async_trait]
impl ChatModel for ClaudeChatModel {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError> {
        let headers = self.headers()?;
        let url = format!("{}/messages", self.base_url);
        let model_name = self.model.as_str();

        let api_request = MessagesRequest::from_chat_request(model_name, request);
        traffic_log::log_stream_start(model_name, &url, &api_request);

        let events = self
            .client
            .post_stream(
                &url,
                headers,
                &api_request,
                SseDecoder::<StreamEvent>::new(),
                cancel,
            )
            .await
            .inspect_err(|e| traffic_log::log_failure(model_name, e))?;

        Ok(text_deltas(events, model_name.to_string(), StreamEvent::into_delta))
    }
}
