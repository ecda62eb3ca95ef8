use crate::client::Client;
use crate::providers::ProviderConfig;
use crate::{ChatModel, ModelId, ModelProvider, Vendor};
use std::sync::Arc;

use super::chat::GroqChatModel;

#[derive(Clone)]
pub struct GroqProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

impl GroqProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        GroqProvider {
            client: Client::new(),
            base_url: format!("{}/v1", config.base_url_or(DEFAULT_BASE_URL)),
            api_key: config.api_key.clone(),
        }
    }
}

impl ModelProvider for GroqProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        (model.vendor() == Vendor::Groq).then(|| {
            Arc::new(GroqChatModel::new(
                self.client.clone(),
                self.base_url.clone(),
                self.api_key.clone(),
                model,
            )) as Arc<dyn ChatModel>
        })
    }
}
