use crate::client::Client;
use crate::providers::ProviderConfig;
use crate::{ChatModel, ModelId, ModelProvider, Vendor};
use std::sync::Arc;

use super::chat::OpenAIChatModel;

#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const API_VERSION: &str = "v1";

impl OpenAIProvider {
    /// The API version path (/v1) is appended to the configured base URL.
    pub fn new(config: &ProviderConfig) -> Self {
        OpenAIProvider {
            client: Client::new(),
            base_url: format!("{}/{}", config.base_url_or(DEFAULT_BASE_URL), API_VERSION),
            api_key: config.api_key.clone(),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        if model.vendor() != Vendor::OpenAI {
            return None;
        }
        Some(Arc::new(OpenAIChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
            model,
        )))
    }
}
