use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod api;
mod client;
mod error;
pub mod framing;
pub mod providers;
pub mod registry;
pub mod traffic_log;

pub use api::*;
pub use client::Client;
pub use error::LlmError;
pub use providers::{GeneralModelProvider, ModelRegistry, ProviderConfig};
pub use registry::{ModelId, UnknownModel, UnknownVendor, Vendor, VendorCapabilities};

/// Lazy, finite, non-restartable sequence of text deltas.
///
/// The stream ends after natural completion. Cancellation surfaces as
/// `Err(LlmError::Cancelled)`; any other `Err` is a transport or vendor
/// failure. Nothing is yielded after the first error.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    fn vendor(&self) -> Vendor;

    /// Start a streaming generation. The token is observed both while the
    /// request is being sent and between every network read.
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError>;
}

/// Resolves a catalogued model to the adapter that serves it.
pub trait ModelProvider: Send + Sync {
    /// Returns `None` when this provider does not serve the model's vendor.
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>>;
}
