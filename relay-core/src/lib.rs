//! Streaming generation core: persistence, cancellation, attachments and
//! the orchestrator that ties them to the vendor adapters in `llm`.

pub mod attachments;
pub mod auth;
pub mod cancellation;
pub mod error;
pub mod generation;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use attachments::{AttachmentMaterializer, AttachmentPolicy, BlobReader, FsBlobReader};
pub use auth::{SessionValidator, StaticSessionValidator};
pub use cancellation::{CancellationHandle, CancellationRegistry};
pub use error::{RelayError, Result};
pub use generation::{
    GenerationEvent, GenerationOutcome, GenerationRequest, GenerationStream, IncompleteCause,
    Orchestrator, ResumeRequest,
};
pub use storage::{
    Attachment, AttachmentId, ChatStore, Conversation, ConversationId, MemoryStore, Message,
    MessageId, MessageRole, MessageStatus, UserId,
};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
