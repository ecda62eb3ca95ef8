//! SQLite implementation of AttachmentStore

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, params};

use super::SqliteStore;
use crate::storage::ids::MessageId;
use crate::storage::traits::AttachmentStore;
use crate::storage::types::Attachment;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id TEXT PRIMARY KEY,
            message_id TEXT REFERENCES messages(id) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size INTEGER NOT NULL,
            locator TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id);
        "#,
    )?;
    Ok(())
}

#[async_trait]
impl AttachmentStore for SqliteStore {
    async fn link_attachments(
        &self,
        message_id: &MessageId,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for attachment in attachments {
            tx.execute(
                "INSERT INTO attachments (id, message_id, file_name, mime_type, size, locator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET message_id = excluded.message_id",
                params![
                    attachment.id,
                    message_id,
                    attachment.file_name,
                    attachment.mime_type,
                    attachment.size as i64,
                    attachment.locator,
                    attachment.created_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn list_attachments(&self, message_id: &MessageId) -> Result<Vec<Attachment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, message_id, file_name, mime_type, size, locator, created_at
             FROM attachments WHERE message_id = ?1 ORDER BY created_at ASC",
        )?;
        let attachments = stmt
            .query_map(params![message_id], |row| {
                let size: i64 = row.get(4)?;
                Ok(Attachment {
                    id: row.get(0)?,
                    message_id: row.get(1)?,
                    file_name: row.get(2)?,
                    mime_type: row.get(3)?,
                    size: size.max(0) as u64,
                    locator: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ids::{AttachmentId, UserId};
    use crate::storage::traits::{ConversationStore, MessageStore};
    use crate::storage::types::Message;

    #[tokio::test]
    async fn test_attachments_follow_their_message() {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = store
            .create_conversation(&UserId::from("u"), "t")
            .await
            .unwrap();
        let message = Message::user(conversation.id.clone(), "look");
        store.insert_message(&message).await.unwrap();

        let attachment = Attachment::new(
            AttachmentId::new(),
            "cat.png",
            "image/png",
            1024,
            "/uploads/cat.png",
        );
        store
            .link_attachments(&message.id, &[attachment.clone()])
            .await
            .unwrap();

        let listed = store.list_attachments(&message.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, attachment.id);
        assert_eq!(listed[0].size, 1024);

        store.delete_message(&message.id).await.unwrap();
        assert!(store.list_attachments(&message.id).await.unwrap().is_empty());
    }
}
