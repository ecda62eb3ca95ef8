//! Stop, inspect and relabel assistant messages owned by a user

use tracing::{debug, info};

use super::orchestrator::Orchestrator;
use crate::error::{RelayError, Result};
use crate::storage::{Message, MessageId, MessageStatus, UserId};

impl Orchestrator {
    /// The message, provided its conversation belongs to `user_id`.
    pub async fn owned_message(&self, user_id: &UserId, id: &MessageId) -> Result<Message> {
        let message = self
            .store
            .get_message(id)
            .await?
            .ok_or(RelayError::NotFound("message"))?;
        match self
            .owned_conversation(user_id, &message.conversation_id)
            .await
        {
            Ok(_) => Ok(message),
            Err(RelayError::NotFound(_)) => Err(RelayError::NotFound("message")),
            Err(e) => Err(e),
        }
    }

    /// Fire the cancellation handle of a running generation. Returns whether
    /// this call fired it.
    ///
    /// A repeated stop while the generation is still settling returns false
    /// and leaves the row to its owner. A row still marked `streaming` with
    /// no registry entry at all belongs to a generation that no longer
    /// exists; it is moved to `incomplete` so it can be resumed.
    pub async fn stop(&self, user_id: &UserId, id: &MessageId) -> Result<bool> {
        let message = self.owned_message(user_id, id).await?;
        if self.registry.trigger(id) {
            info!(message_id = %id, "stop requested");
            return Ok(true);
        }
        if self.registry.is_live(id) {
            debug!(message_id = %id, "stop already pending");
            return Ok(false);
        }
        if message.status == MessageStatus::Streaming
            && self
                .store
                .transition_status(id, MessageStatus::Streaming, MessageStatus::Incomplete)
                .await?
        {
            info!(message_id = %id, "recovered orphaned streaming message");
        }
        Ok(false)
    }

    /// Overwrite the status of a message no generation is writing.
    pub async fn set_status(
        &self,
        user_id: &UserId,
        id: &MessageId,
        status: MessageStatus,
    ) -> Result<()> {
        self.owned_message(user_id, id).await?;
        if self.registry.is_live(id) {
            return Err(RelayError::InProgress);
        }
        self.store.set_message_status(id, status).await?;
        Ok(())
    }
}
