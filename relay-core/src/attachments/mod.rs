//! Attachment policy checks and vendor materialization

mod materializer;
mod policy;

pub use materializer::{AttachmentMaterializer, BlobReader, FsBlobReader};
pub use policy::{AttachmentPolicy, MAX_FILES, validate_attachments};
