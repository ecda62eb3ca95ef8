pub(crate) mod claude;
pub(crate) mod gemini;
pub(crate) mod groq;
pub(crate) mod openai;

pub use claude::{ClaudeChatModel, ClaudeProvider};
pub use gemini::{GeminiChatModel, GeminiProvider};
pub use groq::{GroqChatModel, GroqProvider};
pub use openai::{OpenAIChatModel, OpenAIProvider};

use crate::client::BoxedStream;
use crate::traffic_log;
use crate::{ChatModel, DeltaStream, LlmError, ModelId, ModelProvider, Vendor};
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use std::sync::Arc;

/// Credentials and endpoint for one vendor.
#[derive(Clone, Debug, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Overrides the vendor's public endpoint (e.g. for a proxy or a test server).
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        ProviderConfig {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Read `<VENDOR>_API_KEY` and `<VENDOR>_BASE_URL` from the environment.
    pub fn from_env(vendor: Vendor) -> Self {
        Self::new(
            std::env::var(vendor.api_key_env()).ok(),
            std::env::var(vendor.base_url_env()).ok(),
        )
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

pub enum GeneralModelProvider {
    OpenAI(OpenAIProvider),
    Claude(ClaudeProvider),
    Gemini(GeminiProvider),
    Groq(GroqProvider),
}

impl GeneralModelProvider {
    pub fn new(vendor: Vendor, config: &ProviderConfig) -> Self {
        match vendor {
            Vendor::OpenAI => GeneralModelProvider::OpenAI(OpenAIProvider::new(config)),
            Vendor::Anthropic => GeneralModelProvider::Claude(ClaudeProvider::new(config)),
            Vendor::Gemini => GeneralModelProvider::Gemini(GeminiProvider::new(config)),
            Vendor::Groq => GeneralModelProvider::Groq(GroqProvider::new(config)),
        }
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            GeneralModelProvider::OpenAI(_) => Vendor::OpenAI,
            GeneralModelProvider::Claude(_) => Vendor::Anthropic,
            GeneralModelProvider::Gemini(_) => Vendor::Gemini,
            GeneralModelProvider::Groq(_) => Vendor::Groq,
        }
    }
}

impl ModelProvider for GeneralModelProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        match self {
            GeneralModelProvider::OpenAI(p) => p.create_chat_model(model),
            GeneralModelProvider::Claude(p) => p.create_chat_model(model),
            GeneralModelProvider::Gemini(p) => p.create_chat_model(model),
            GeneralModelProvider::Groq(p) => p.create_chat_model(model),
        }
    }
}

/// One provider per vendor, built once at startup. Resolving a model is a
/// lookup on its vendor tag.
pub struct ModelRegistry {
    providers: Vec<GeneralModelProvider>,
}

impl ModelRegistry {
    pub fn new(config_for: impl Fn(Vendor) -> ProviderConfig) -> Self {
        let providers = Vendor::ALL
            .into_iter()
            .map(|vendor| GeneralModelProvider::new(vendor, &config_for(vendor)))
            .collect();
        ModelRegistry { providers }
    }

    pub fn from_env() -> Self {
        Self::new(ProviderConfig::from_env)
    }

    pub fn provider(&self, vendor: Vendor) -> Option<&GeneralModelProvider> {
        self.providers.iter().find(|p| p.vendor() == vendor)
    }
}

impl ModelProvider for ModelRegistry {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        self.provider(model.vendor())?.create_chat_model(model)
    }
}

pub(crate) fn require_key(api_key: &Option<String>, vendor: Vendor) -> Result<&str, LlmError> {
    api_key
        .as_deref()
        .ok_or(LlmError::MissingCredential(vendor.name()))
}

pub(crate) fn bearer_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| LlmError::InvalidRequest("invalid API key format".to_string()))?,
    );
    Ok(headers)
}

/// Map decoded vendor events to text deltas. `extract` returns `None` for
/// events that carry no text; they are drained but not forwarded.
pub(crate) fn text_deltas<T, F>(
    events: BoxedStream<Result<T, LlmError>>,
    model_name: String,
    extract: F,
) -> DeltaStream
where
    T: Serialize + Send + 'static,
    F: Fn(T) -> Option<Result<String, LlmError>> + Send + 'static,
{
    Box::pin(events.filter_map(move |event| {
        let delta = match event {
            Ok(event) => {
                traffic_log::log_stream_event(&model_name, &event);
                extract(event)
            }
            Err(e) => {
                traffic_log::log_failure(&model_name, &e);
                Some(Err(e))
            }
        };
        futures::future::ready(delta.filter(|d| !matches!(d, Ok(text) if text.is_empty())))
    }))
}
