//! Continuing an `incomplete` assistant message in place

use llm::{ChatMessage, ChatRequest, ModelId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::drain::{ClientChannel, Drain, Registration};
use super::events::GenerationEvent;
use super::orchestrator::{GenerationStream, Orchestrator, history_messages};
use crate::error::{RelayError, Result};
use crate::storage::{ConversationId, MessageId, MessageRole, MessageStatus, UserId};

/// Characters of prior output quoted back when it ends on a sentence boundary.
const TAIL_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct ResumeRequest {
    pub user_id: UserId,
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub model: ModelId,
}

/// The fragment the previous output was cut at: the text after the last
/// sentence terminator, or the last few characters when it ended cleanly.
fn cut_point(content: &str) -> String {
    let fragment = content.rsplit(['.', '!', '?']).next().unwrap_or("").trim();
    if !fragment.is_empty() {
        return fragment.to_string();
    }
    let chars = content.chars().count();
    content
        .chars()
        .skip(chars.saturating_sub(TAIL_CHARS))
        .collect::<String>()
        .trim()
        .to_string()
}

pub(crate) fn continuation_prompt(content: &str) -> String {
    format!(
        "Please continue your previous response exactly where you left off. \
         Your response was cut off mid-way at: \"{}\". \
         Continue from exactly where you stopped, without repeating what you already wrote. \
         Continue seamlessly as if you never stopped.",
        cut_point(content)
    )
}

impl Orchestrator {
    /// Re-run generation for an `incomplete` assistant message, appending
    /// the new deltas to what was already stored.
    ///
    /// Fails with [`RelayError::InProgress`] while a generation still owns
    /// the row, including one that was stopped and has not settled yet, and
    /// with [`RelayError::NotResumable`] unless the row is exactly
    /// `incomplete`. The status check and the switch to `streaming` are one
    /// atomic update, so a concurrent resume loses.
    pub async fn resume(&self, request: ResumeRequest) -> Result<GenerationStream> {
        let message = self
            .store
            .get_message(&request.message_id)
            .await?
            .filter(|m| m.conversation_id == request.conversation_id)
            .ok_or(RelayError::NotFound("message"))?;
        self.owned_conversation(&request.user_id, &request.conversation_id)
            .await?;
        if message.role != MessageRole::Assistant {
            return Err(RelayError::NotResumable);
        }
        let model = self.resolve_model(request.model)?;

        // Claimed before the row flips, so a stop never finds it streaming
        // without an owner.
        let registration = Registration::try_new(Arc::clone(&self.registry), &message.id)
            .ok_or(RelayError::InProgress)?;
        if !self
            .store
            .transition_status(&message.id, MessageStatus::Incomplete, MessageStatus::Streaming)
            .await?
        {
            return Err(RelayError::NotResumable);
        }

        let history = self.store.list_messages(&message.conversation_id).await?;
        let prior = history.iter().take_while(|m| m.id != message.id);
        let mut messages: Vec<ChatMessage> = history_messages(prior).collect();
        messages.push(ChatMessage::user(continuation_prompt(&message.content)));

        let (tx, events) = mpsc::unbounded_channel();
        let mut client = ClientChannel::new(tx);
        client.send(GenerationEvent::Started {
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
        });
        info!(
            message_id = %message.id,
            model = %request.model,
            chars = message.content.len(),
            "resuming generation"
        );

        let drain = Drain {
            store: Arc::clone(&self.store),
            model,
            message_id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            registration,
            client,
            accumulator: message.content,
        };
        let task = tokio::spawn(drain.run(ChatRequest::new(messages)));

        Ok(GenerationStream {
            message_id: message.id,
            conversation_id: message.conversation_id,
            events,
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationOutcome, IncompleteCause};
    use crate::storage::{ConversationStore, MemoryStore, Message, MessageStore};
    use crate::testing::{ScriptStep, ScriptedProvider, orchestrator};
    use llm::Role;

    /// A conversation holding "Hello" and an incomplete reply "Hi".
    async fn seeded(store: &MemoryStore) -> (UserId, ConversationId, MessageId) {
        let user = UserId::new();
        let conversation = store.create_conversation(&user, "Hello").await.unwrap();
        store
            .insert_message(&Message::user(conversation.id.clone(), "Hello"))
            .await
            .unwrap();
        let mut reply = Message::placeholder(conversation.id.clone(), "gpt-4o");
        reply.content = "Hi".into();
        reply.status = MessageStatus::Incomplete;
        store.insert_message(&reply).await.unwrap();
        (user, conversation.id, reply.id)
    }

    fn resume_request(
        user: UserId,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> ResumeRequest {
        ResumeRequest {
            user_id: user,
            message_id,
            conversation_id,
            model: ModelId::Gpt4o,
        }
    }

    #[tokio::test]
    async fn test_resume_appends_to_prior_content() {
        let store = Arc::new(MemoryStore::new());
        let (user, conversation_id, message_id) = seeded(&store).await;
        let provider = ScriptedProvider::new(vec![
            ScriptStep::Delta(" there".into()),
            ScriptStep::Delta("!".into()),
        ]);
        let orchestrator = orchestrator(store.clone(), provider.clone());

        let mut stream = orchestrator
            .resume(resume_request(user, conversation_id.clone(), message_id.clone()))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.events.recv().await {
            events.push(event);
        }
        assert_eq!(
            events.first(),
            Some(&GenerationEvent::Started {
                message_id: message_id.clone(),
                conversation_id: conversation_id.clone(),
            })
        );
        assert_eq!(events.last(), Some(&GenerationEvent::done(conversation_id)));

        assert_eq!(
            stream.task.await.unwrap(),
            GenerationOutcome::Complete {
                content: "Hi there!".into()
            }
        );
        let message = store.get_message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "Hi there!");
        assert_eq!(message.status, MessageStatus::Complete);

        // History stops before the resumed row and ends with the instruction.
        let sent = &provider.requests()[0];
        let turns: Vec<(Role, String)> = sent
            .messages
            .iter()
            .map(|m| (m.role, m.get_text()))
            .collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], (Role::User, "Hello".to_string()));
        assert_eq!(turns[1].0, Role::User);
        assert!(turns[1].1.contains("cut off mid-way at: \"Hi\""));
    }

    #[tokio::test]
    async fn test_resume_failing_immediately_leaves_row_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let (user, conversation_id, message_id) = seeded(&store).await;
        let orchestrator = orchestrator(
            store.clone(),
            ScriptedProvider::new(vec![ScriptStep::Fail("overloaded".into())]),
        );

        let mut stream = orchestrator
            .resume(resume_request(user, conversation_id, message_id.clone()))
            .await
            .unwrap();
        let mut last = None;
        while let Some(event) = stream.events.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(GenerationEvent::error()));
        assert_eq!(
            stream.task.await.unwrap(),
            GenerationOutcome::Incomplete {
                cause: IncompleteCause::Upstream,
                content: "Hi".into()
            }
        );

        let message = store.get_message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "Hi");
        assert_eq!(message.status, MessageStatus::Incomplete);
        assert!(orchestrator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_resume_rejects_non_incomplete() {
        let store = Arc::new(MemoryStore::new());
        let (user, conversation_id, message_id) = seeded(&store).await;
        store
            .set_message_status(&message_id, MessageStatus::Streaming)
            .await
            .unwrap();
        let orchestrator = orchestrator(store.clone(), ScriptedProvider::new(Vec::new()));

        let err = orchestrator
            .resume(resume_request(user, conversation_id, message_id))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::NotResumable));
    }

    #[tokio::test]
    async fn test_concurrent_resume_only_one_wins() {
        let store = Arc::new(MemoryStore::new());
        let (user, conversation_id, message_id) = seeded(&store).await;
        let orchestrator = orchestrator(
            store.clone(),
            ScriptedProvider::new(vec![ScriptStep::WaitForCancel]),
        );

        let request = resume_request(user, conversation_id, message_id.clone());
        let (first, second) = tokio::join!(
            orchestrator.resume(request.clone()),
            orchestrator.resume(request)
        );
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );

        assert!(orchestrator.registry().trigger(&message_id));
        let winner = first.or(second).ok().unwrap();
        winner.task.await.unwrap();
        let message = store.get_message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.status, MessageStatus::Incomplete);
        assert_eq!(message.content, "Hi");
    }

    #[tokio::test]
    async fn test_resume_requires_matching_owner_and_conversation() {
        let store = Arc::new(MemoryStore::new());
        let (user, conversation_id, message_id) = seeded(&store).await;
        let orchestrator = orchestrator(store.clone(), ScriptedProvider::new(Vec::new()));

        let err = orchestrator
            .resume(resume_request(UserId::new(), conversation_id, message_id.clone()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::NotFound(_)));

        let err = orchestrator
            .resume(resume_request(user, ConversationId::new(), message_id.clone()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::NotFound(_)));

        let message = store.get_message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.status, MessageStatus::Incomplete);
    }

    #[test]
    fn test_cut_point() {
        assert_eq!(cut_point("First. Then the second"), "Then the second");
        assert_eq!(cut_point("Done!"), "Done!");
        assert_eq!(cut_point(""), "");
    }
}
