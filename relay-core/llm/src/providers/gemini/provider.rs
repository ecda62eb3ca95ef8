use crate::client::Client;
use crate::providers::ProviderConfig;
use crate::{ChatModel, ModelId, ModelProvider, Vendor};
use std::sync::Arc;

use super::chat::GeminiChatModel;

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        GeminiProvider {
            client: Client::new(),
            base_url: config.base_url_or(DEFAULT_BASE_URL),
            api_key: config.api_key.clone(),
        }
    }
}

impl ModelProvider for GeminiProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        if model.vendor() != Vendor::Gemini {
            return None;
        }
        Some(Arc::new(GeminiChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
            model,
        )))
    }
}
