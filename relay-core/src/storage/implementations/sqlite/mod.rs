//! SQLite storage backend
//!
//! `SqliteStore` is a shared connection wrapper implementing every storage
//! trait. Trait implementations live in submodules:
//! - `conversation` - ConversationStore impl
//! - `message` - MessageStore impl
//! - `attachment` - AttachmentStore impl

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

mod attachment;
mod conversation;
mod message;

/// Shared SQLite connection
///
/// Create one store and share it via `Arc` across all components that need
/// database access.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(&path)?)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conversation::init_schema(&conn)?;
        message::init_schema(&conn)?;
        attachment::init_schema(&conn)?;
        Ok(())
    }
}
