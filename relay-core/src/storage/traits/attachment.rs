//! AttachmentStore trait for upload metadata

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::MessageId;
use crate::storage::types::Attachment;

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Record the attachments as belonging to `message_id`. Rows that
    /// already exist (created at upload time) are linked, others inserted.
    async fn link_attachments(&self, message_id: &MessageId, attachments: &[Attachment])
    -> Result<()>;

    async fn list_attachments(&self, message_id: &MessageId) -> Result<Vec<Attachment>>;
}
