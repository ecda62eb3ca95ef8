//! Persistence for conversations, messages and attachment metadata

pub mod helper;
pub mod ids;
pub mod implementations;
pub mod traits;
pub mod types;

pub use ids::{AttachmentId, ConversationId, MessageId, UserId};
pub use implementations::MemoryStore;
#[cfg(feature = "sqlite")]
pub use implementations::SqliteStore;
pub use traits::{AttachmentStore, ChatStore, ConversationStore, MessageStore};
pub use types::{Attachment, Conversation, Message, MessageRole, MessageStatus};
