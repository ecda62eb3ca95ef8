//! SQLite implementation of ConversationStore

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::SqliteStore;
use crate::storage::helper::unix_timestamp;
use crate::storage::ids::{ConversationId, UserId};
use crate::storage::traits::ConversationStore;
use crate::storage::types::Conversation;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at);
        "#,
    )?;
    Ok(())
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, user_id: &UserId, title: &str) -> Result<Conversation> {
        let conn = self.conn()?;
        let now = unix_timestamp();
        let conversation = Conversation {
            id: ConversationId::new(),
            user_id: user_id.clone(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![conversation.id, conversation.user_id, conversation.title, now, now],
        )?;

        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        let conversation = conn
            .query_row(
                "SELECT id, user_id, title, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(conversation)
    }

    async fn touch_conversation(&self, id: &ConversationId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![unix_timestamp(), id],
        )?;
        Ok(())
    }
}
