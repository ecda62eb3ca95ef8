//! The background half of a generation
//!
//! Drains a vendor stream into the assistant row and forwards each delta to
//! the client channel while it stays open. Only the cancellation handle can
//! end the drain early; a closed client channel never does.

use futures::StreamExt;
use llm::{ChatModel, ChatRequest, LlmError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::events::GenerationEvent;
use crate::cancellation::{CancellationHandle, CancellationRegistry};
use crate::storage::{ChatStore, ConversationId, MessageId, MessageStatus};

/// Why a generation stopped before the vendor finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncompleteCause {
    /// A stop request fired the cancellation handle.
    UserStop,
    /// The vendor call or its stream failed.
    Upstream,
    /// The request could not be sent after the placeholder existed.
    RequestAborted,
    /// Writing the accumulated content failed.
    Persistence,
}

impl IncompleteCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncompleteCause::UserStop => "user_stop",
            IncompleteCause::Upstream => "upstream",
            IncompleteCause::RequestAborted => "request_aborted",
            IncompleteCause::Persistence => "persistence",
        }
    }
}

impl fmt::Display for IncompleteCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the assistant row ended up once the generation task returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    Complete {
        content: String,
    },
    Incomplete {
        cause: IncompleteCause,
        content: String,
    },
    /// The row was deleted because nothing was generated.
    Discarded {
        cause: Option<IncompleteCause>,
    },
}

/// Sending side of the client channel. Remembers a disconnect so later
/// events are skipped quietly.
pub(crate) struct ClientChannel {
    tx: mpsc::UnboundedSender<GenerationEvent>,
    connected: bool,
}

impl ClientChannel {
    pub(crate) fn new(tx: mpsc::UnboundedSender<GenerationEvent>) -> Self {
        ClientChannel {
            tx,
            connected: true,
        }
    }

    pub(crate) fn send(&mut self, event: GenerationEvent) {
        if self.connected && self.tx.send(event).is_err() {
            self.connected = false;
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Releases the registry entry when the generation task ends, however it
/// ends.
pub(crate) struct Registration {
    registry: Arc<CancellationRegistry>,
    message_id: MessageId,
    handle: CancellationHandle,
}

impl Registration {
    pub(crate) fn new(registry: Arc<CancellationRegistry>, message_id: &MessageId) -> Self {
        let handle = registry.register(message_id);
        Registration {
            registry,
            message_id: message_id.clone(),
            handle,
        }
    }

    /// Claim `message_id` only if no other generation holds it.
    pub(crate) fn try_new(registry: Arc<CancellationRegistry>, message_id: &MessageId) -> Option<Self> {
        let handle = registry.try_register(message_id)?;
        Some(Registration {
            registry,
            message_id: message_id.clone(),
            handle,
        })
    }

    pub(crate) fn release(&self) {
        self.registry.release_handle(&self.message_id, &self.handle);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

pub(crate) struct Drain {
    pub(crate) store: Arc<dyn ChatStore>,
    pub(crate) model: Arc<dyn ChatModel>,
    pub(crate) message_id: MessageId,
    pub(crate) conversation_id: ConversationId,
    pub(crate) registration: Registration,
    pub(crate) client: ClientChannel,
    /// Everything generated so far for this row, seeded with the prior
    /// content on resume.
    pub(crate) accumulator: String,
}

impl Drain {
    pub(crate) async fn run(mut self, request: ChatRequest) -> GenerationOutcome {
        let result = self.drain(&request).await;
        self.finish(result).await
    }

    async fn drain(&mut self, request: &ChatRequest) -> Result<(), IncompleteCause> {
        let token = self.registration.handle.token().clone();

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(IncompleteCause::UserStop),
            result = self.model.stream_chat(request, token.clone()) => match result {
                Ok(stream) => stream,
                Err(e) => return Err(self.classify(e)),
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(IncompleteCause::UserStop),
                next = stream.next() => next,
            };
            match next {
                None => return Ok(()),
                Some(Ok(delta)) => {
                    self.accumulator.push_str(&delta);
                    if let Err(e) = self
                        .store
                        .update_message_content(&self.message_id, &self.accumulator)
                        .await
                    {
                        error!(message_id = %self.message_id, error = %e, "failed to persist delta");
                        return Err(IncompleteCause::Persistence);
                    }
                    let was_connected = self.client.is_connected();
                    self.client.send(GenerationEvent::Delta { content: delta });
                    if was_connected && !self.client.is_connected() {
                        info!(
                            message_id = %self.message_id,
                            "client disconnected, generation continues in background"
                        );
                    }
                }
                Some(Err(e)) => return Err(self.classify(e)),
            }
        }
    }

    fn classify(&self, e: LlmError) -> IncompleteCause {
        if e.is_cancelled() {
            IncompleteCause::UserStop
        } else {
            warn!(
                message_id = %self.message_id,
                model = %self.model.name(),
                error = %e,
                "vendor stream failed"
            );
            IncompleteCause::Upstream
        }
    }

    /// Settle the row for `result`, release the registry entry and emit the
    /// terminal event.
    pub(crate) async fn finish(mut self, result: Result<(), IncompleteCause>) -> GenerationOutcome {
        let content = std::mem::take(&mut self.accumulator);
        let (outcome, terminal) = match result {
            Ok(()) => {
                let outcome = if content.is_empty() {
                    self.discard().await;
                    GenerationOutcome::Discarded { cause: None }
                } else {
                    self.persist(&content, MessageStatus::Complete).await;
                    GenerationOutcome::Complete { content }
                };
                let done = GenerationEvent::done(self.conversation_id.clone());
                (outcome, Some(done))
            }
            Err(IncompleteCause::UserStop) => {
                // Stopped rows are kept even when empty so they stay resumable.
                self.persist(&content, MessageStatus::Incomplete).await;
                let outcome = GenerationOutcome::Incomplete {
                    cause: IncompleteCause::UserStop,
                    content,
                };
                (outcome, None)
            }
            Err(cause) => {
                let outcome = if content.is_empty() {
                    self.discard().await;
                    GenerationOutcome::Discarded { cause: Some(cause) }
                } else {
                    self.persist(&content, MessageStatus::Incomplete).await;
                    GenerationOutcome::Incomplete { cause, content }
                };
                (outcome, Some(GenerationEvent::error()))
            }
        };

        // The row is settled; a client reacting to the terminal event must
        // already be able to act on it.
        self.registration.release();
        if let Some(event) = terminal {
            self.client.send(event);
        }

        match &outcome {
            GenerationOutcome::Complete { content } => {
                info!(message_id = %self.message_id, chars = content.len(), "generation complete")
            }
            GenerationOutcome::Incomplete { cause, content } => info!(
                message_id = %self.message_id,
                cause = %cause,
                chars = content.len(),
                "generation incomplete"
            ),
            GenerationOutcome::Discarded { cause } => debug!(
                message_id = %self.message_id,
                cause = cause.map(|c| c.as_str()).unwrap_or("empty"),
                "placeholder discarded"
            ),
        }
        outcome
    }

    async fn persist(&self, content: &str, status: MessageStatus) {
        if let Err(e) = self
            .store
            .finalize_message(&self.message_id, content, status)
            .await
        {
            error!(message_id = %self.message_id, status = %status, error = %e, "failed to finalize message");
        }
    }

    async fn discard(&self) {
        if let Err(e) = self.store.delete_message(&self.message_id).await {
            error!(message_id = %self.message_id, error = %e, "failed to delete empty placeholder");
        }
    }
}
