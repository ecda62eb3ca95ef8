use crate::client::Client;
use crate::providers::ProviderConfig;
use crate::{ChatModel, ModelId, ModelProvider, Vendor};
use std::sync::Arc;

use super::chat::ClaudeChatModel;

#[derive(Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

impl ClaudeProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        ClaudeProvider {
            client: Client::new(),
            base_url: format!("{}/v1", config.base_url_or(DEFAULT_BASE_URL)),
            api_key: config.api_key.clone(),
        }
    }
}

impl ModelProvider for ClaudeProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        if model.vendor() != Vendor::Anthropic {
            return None;
        }
        Some(Arc::new(ClaudeChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
            model,
        )))
    }
}
