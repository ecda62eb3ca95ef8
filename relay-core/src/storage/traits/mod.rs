//! Storage traits
//!
//! - `ConversationStore` - conversation lifecycle
//! - `MessageStore` - message rows and status transitions
//! - `AttachmentStore` - upload metadata linked to messages

mod attachment;
mod conversation;
mod message;

pub use attachment::AttachmentStore;
pub use conversation::ConversationStore;
pub use message::MessageStore;

/// Everything the generation pipeline needs from persistence.
pub trait ChatStore: ConversationStore + MessageStore + AttachmentStore {}

impl<T> ChatStore for T where T: ConversationStore + MessageStore + AttachmentStore {}
