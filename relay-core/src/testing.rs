//! In-process chat model that replays a fixed script, for driving the
//! orchestrator without a network.

use async_trait::async_trait;
use futures::stream;
use llm::{ChatModel, ChatRequest, DeltaStream, LlmError, ModelId, ModelProvider, Vendor};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::attachments::{AttachmentMaterializer, FsBlobReader};
use crate::cancellation::CancellationRegistry;
use crate::generation::Orchestrator;
use crate::storage::ChatStore;

#[derive(Clone, Debug)]
pub enum ScriptStep {
    Delta(String),
    /// End the stream with a vendor error.
    Fail(String),
    /// Block until the generation is cancelled, then report it.
    WaitForCancel,
    /// Block until the gate is notified.
    Wait(Arc<Notify>),
}

pub struct ScriptedModel {
    model: ModelId,
    steps: Vec<ScriptStep>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    fn vendor(&self) -> Vendor {
        self.model.vendor()
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let steps: VecDeque<ScriptStep> = self.steps.clone().into();
        let deltas = stream::unfold(Some((steps, cancel)), |state| async move {
            let (mut steps, cancel) = state?;
            loop {
                match steps.pop_front()? {
                    ScriptStep::Delta(text) => return Some((Ok(text), Some((steps, cancel)))),
                    ScriptStep::Fail(message) => return Some((Err(LlmError::Vendor(message)), None)),
                    ScriptStep::WaitForCancel => {
                        cancel.cancelled().await;
                        return Some((Err(LlmError::Cancelled), None));
                    }
                    ScriptStep::Wait(gate) => gate.notified().await,
                }
            }
        });
        Ok(Box::pin(deltas))
    }
}

/// Hands out a [`ScriptedModel`] running the same script for every model,
/// and records each request it receives.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    steps: Vec<ScriptStep>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        ScriptedProvider {
            steps,
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ModelProvider for ScriptedProvider {
    fn create_chat_model(&self, model: ModelId) -> Option<Arc<dyn ChatModel>> {
        Some(Arc::new(ScriptedModel {
            model,
            steps: self.steps.clone(),
            requests: Arc::clone(&self.requests),
        }))
    }
}

/// An orchestrator over `store` whose models follow `provider`'s script.
pub fn orchestrator(store: Arc<dyn ChatStore>, provider: ScriptedProvider) -> Orchestrator {
    Orchestrator::new(
        store,
        Arc::new(provider),
        Arc::new(CancellationRegistry::new()),
        Arc::new(AttachmentMaterializer::new(
            Arc::new(FsBlobReader::new("public")),
            None,
        )),
    )
}
