//! SQLite implementation of MessageStore

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::SqliteStore;
use crate::storage::helper::unix_timestamp;
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::traits::MessageStore;
use crate::storage::types::{Message, MessageStatus};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- seq orders rows created within the same millisecond
        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            model TEXT,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at, seq);
        "#,
    )?;
    Ok(())
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, model, status, created_at, updated_at";

type MessageRow = (
    MessageId,
    ConversationId,
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
);

fn read_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_message(row: MessageRow) -> Result<Message> {
    let (id, conversation_id, role, content, model, status, created_at, updated_at) = row;
    Ok(Message {
        id,
        conversation_id,
        role: role.parse()?,
        content,
        model,
        status: status.parse()?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, model, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                message.conversation_id,
                message.role.as_str(),
                message.content,
                message.model,
                message.status.as_str(),
                message.created_at,
                message.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
                params![id],
                read_row,
            )
            .optional()?;
        row.map(into_message).transpose()
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, seq ASC",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![conversation_id], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_message).collect()
    }

    async fn update_message_content(&self, id: &MessageId, content: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE messages SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, unix_timestamp(), id],
        )?;
        if updated == 0 {
            return Err(anyhow!("message {} not found", id));
        }
        Ok(())
    }

    async fn set_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), unix_timestamp(), id],
        )?;
        if updated == 0 {
            return Err(anyhow!("message {} not found", id));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &MessageId,
        from: MessageStatus,
        to: MessageStatus,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), unix_timestamp(), id, from.as_str()],
        )?;
        Ok(updated == 1)
    }

    async fn finalize_message(
        &self,
        id: &MessageId,
        content: &str,
        status: MessageStatus,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE messages SET content = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![content, status.as_str(), unix_timestamp(), id],
        )?;
        if updated == 0 {
            return Err(anyhow!("message {} not found", id));
        }
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ids::UserId;
    use crate::storage::traits::ConversationStore;
    use crate::storage::types::MessageRole;

    #[tokio::test]
    async fn test_message_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = store
            .create_conversation(&UserId::from("u"), "Hello")
            .await
            .unwrap();

        let user = Message::user(conversation.id.clone(), "Hello");
        let placeholder = Message::placeholder(conversation.id.clone(), "gpt-4o-mini");
        store.insert_message(&user).await.unwrap();
        store.insert_message(&placeholder).await.unwrap();

        store
            .update_message_content(&placeholder.id, "Hi")
            .await
            .unwrap();
        store
            .finalize_message(&placeholder.id, "Hi there!", MessageStatus::Complete)
            .await
            .unwrap();

        let listed = store.list_messages(&conversation.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].role, MessageRole::User);
        assert_eq!(listed[1].content, "Hi there!");
        assert_eq!(listed[1].status, MessageStatus::Complete);
        assert_eq!(listed[1].model.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_same_millisecond_rows_keep_insertion_order() {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = store
            .create_conversation(&UserId::from("u"), "t")
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut message = Message::user(conversation.id.clone(), format!("m{}", i));
            message.created_at = 1000;
            ids.push(message.id.clone());
            store.insert_message(&message).await.unwrap();
        }

        let listed: Vec<MessageId> = store
            .list_messages(&conversation.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_transition_and_delete() {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = store
            .create_conversation(&UserId::from("u"), "t")
            .await
            .unwrap();
        let placeholder = Message::placeholder(conversation.id.clone(), "gpt-4o");
        store.insert_message(&placeholder).await.unwrap();

        assert!(
            !store
                .transition_status(&placeholder.id, MessageStatus::Incomplete, MessageStatus::Streaming)
                .await
                .unwrap()
        );
        assert!(
            store
                .transition_status(&placeholder.id, MessageStatus::Streaming, MessageStatus::Incomplete)
                .await
                .unwrap()
        );

        store.delete_message(&placeholder.id).await.unwrap();
        assert!(store.get_message(&placeholder.id).await.unwrap().is_none());
        assert!(
            store
                .update_message_content(&placeholder.id, "x")
                .await
                .is_err()
        );
    }
}
