use llm::{ChatMessage, ChatModel, ChatPayload, ChatRequest, ContentBlock, ModelId, ModelProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::drain::{ClientChannel, Drain, GenerationOutcome, IncompleteCause, Registration};
use super::events::GenerationEvent;
use crate::attachments::{AttachmentMaterializer, validate_attachments};
use crate::cancellation::CancellationRegistry;
use crate::error::{RelayError, Result};
use crate::storage::helper::conversation_title;
use crate::storage::{
    Attachment, ChatStore, Conversation, ConversationId, Message, MessageId, MessageRole, UserId,
};

const UNTITLED: &str = "New conversation";

#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub user_id: UserId,
    /// Absent for the first message of a new conversation.
    pub conversation_id: Option<ConversationId>,
    pub message: String,
    pub model: ModelId,
    pub system_prompt: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// A running generation as seen by the caller.
///
/// `events` already holds the `Started` event. Dropping it detaches the
/// client without affecting the generation; `task` resolves once the row
/// has been settled.
pub struct GenerationStream {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub events: mpsc::UnboundedReceiver<GenerationEvent>,
    pub task: JoinHandle<GenerationOutcome>,
}

/// Runs generations: persists the exchange, streams the vendor reply into
/// the assistant row and keeps the cancellation registry in step.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) store: Arc<dyn ChatStore>,
    models: Arc<dyn ModelProvider>,
    pub(crate) registry: Arc<CancellationRegistry>,
    materializer: Arc<AttachmentMaterializer>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        models: Arc<dyn ModelProvider>,
        registry: Arc<CancellationRegistry>,
        materializer: Arc<AttachmentMaterializer>,
    ) -> Self {
        Orchestrator {
            store,
            models,
            registry,
            materializer,
        }
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub(crate) fn resolve_model(&self, model: ModelId) -> Result<Arc<dyn ChatModel>> {
        self.models
            .create_chat_model(model)
            .ok_or_else(|| RelayError::Validation(format!("Model {} is not available", model)))
    }

    /// Look up a conversation the user owns.
    pub(crate) async fn owned_conversation(
        &self,
        user_id: &UserId,
        id: &ConversationId,
    ) -> Result<Conversation> {
        self.store
            .get_conversation(id)
            .await?
            .filter(|c| &c.user_id == user_id)
            .ok_or(RelayError::NotFound("conversation"))
    }

    /// Validate, persist the user message and start streaming the reply.
    ///
    /// Errors are returned only for problems found before the placeholder
    /// exists; everything after that ends up in the event stream.
    pub async fn start(&self, request: GenerationRequest) -> Result<GenerationStream> {
        // 1. Validate before anything is written
        if request.message.trim().is_empty() && request.attachments.is_empty() {
            return Err(RelayError::Validation("Message is required".into()));
        }
        validate_attachments(request.model, &request.attachments)?;
        let model = self.resolve_model(request.model)?;

        let conversation = match &request.conversation_id {
            Some(id) => self.owned_conversation(&request.user_id, id).await?,
            None => {
                let title = conversation_title(&request.message);
                let title = if title.is_empty() { UNTITLED.to_string() } else { title };
                self.store
                    .create_conversation(&request.user_id, &title)
                    .await?
            }
        };

        // 2. Persist the user message
        let user_message = Message::user(conversation.id.clone(), request.message.clone());
        self.store.insert_message(&user_message).await?;
        if !request.attachments.is_empty() {
            self.store
                .link_attachments(&user_message.id, &request.attachments)
                .await?;
        }
        self.store.touch_conversation(&conversation.id).await?;

        // 3. History, oldest first, ending with the message just stored
        let history = self.store.list_messages(&conversation.id).await?;

        // 4. Placeholder and registration, announced before the first token
        let placeholder = Message::placeholder(conversation.id.clone(), request.model.as_str());
        let registration = Registration::new(Arc::clone(&self.registry), &placeholder.id);
        self.store.insert_message(&placeholder).await?;

        let (tx, events) = mpsc::unbounded_channel();
        let mut client = ClientChannel::new(tx);
        client.send(GenerationEvent::Started {
            message_id: placeholder.id.clone(),
            conversation_id: conversation.id.clone(),
        });
        info!(
            message_id = %placeholder.id,
            conversation_id = %conversation.id,
            model = %request.model,
            "generation started"
        );

        let drain = Drain {
            store: Arc::clone(&self.store),
            model: Arc::clone(&model),
            message_id: placeholder.id.clone(),
            conversation_id: conversation.id.clone(),
            registration,
            client,
            accumulator: String::new(),
        };

        // 5. Everything from here runs whether or not the client stays
        let materializer = Arc::clone(&self.materializer);
        let task = tokio::spawn(async move {
            let attachments = materializer
                .materialize(model.vendor(), &request.attachments)
                .await;
            let chat_request = build_request(
                request.system_prompt.as_deref(),
                &history,
                &user_message.id,
                attachments,
            );
            match chat_request {
                Some(chat_request) => drain.run(chat_request).await,
                None => {
                    debug!("nothing left to send after attachment materialization");
                    drain.finish(Err(IncompleteCause::RequestAborted)).await
                }
            }
        });

        Ok(GenerationStream {
            message_id: placeholder.id,
            conversation_id: conversation.id,
            events,
            task,
        })
    }
}

pub(crate) fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(message.content.as_str()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.as_str()),
    }
}

/// Prior turns as vendor messages. Rows with no text (empty placeholders
/// of abandoned generations) are skipped.
pub(crate) fn history_messages<'a>(
    history: impl IntoIterator<Item = &'a Message>,
) -> impl Iterator<Item = ChatMessage> {
    history
        .into_iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(to_chat_message)
}

/// Assemble the vendor request. Attachments go on the current user message
/// only. Returns `None` when that message has nothing left to send.
fn build_request(
    system_prompt: Option<&str>,
    history: &[Message],
    current: &MessageId,
    attachments: Vec<ContentBlock>,
) -> Option<ChatRequest> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        messages.push(ChatMessage::system(prompt));
    }

    let (prior, current_message) = match history.iter().position(|m| &m.id == current) {
        Some(index) => (&history[..index], Some(&history[index])),
        None => (history, None),
    };
    messages.extend(history_messages(prior));

    let mut content = Vec::with_capacity(attachments.len() + 1);
    if let Some(message) = current_message.filter(|m| !m.content.trim().is_empty()) {
        content.push(ContentBlock::Text {
            text: message.content.clone(),
        });
    }
    content.extend(attachments);
    let payload = ChatPayload::new(content);
    if payload.is_empty() {
        return None;
    }
    messages.push(ChatMessage::user(payload));

    Some(ChatRequest::new(messages))
}
