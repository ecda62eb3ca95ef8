//! Per-model attachment acceptance rules, checked before anything is stored.

use llm::ModelId;

use crate::error::RelayError;
use crate::storage::Attachment;

const MB: u64 = 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Maximum number of attachments on one message.
pub const MAX_FILES: usize = 10;

/// The aggregate cap is this many times the per-file cap.
const AGGREGATE_FACTOR: u64 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub allowed_mime_types: &'static [&'static str],
    pub max_file_size_mb: u64,
    pub max_files: usize,
}

impl AttachmentPolicy {
    const NONE: AttachmentPolicy = AttachmentPolicy {
        allowed_mime_types: &[],
        max_file_size_mb: 0,
        max_files: 0,
    };

    const fn images(max_file_size_mb: u64) -> Self {
        AttachmentPolicy {
            allowed_mime_types: IMAGE_TYPES,
            max_file_size_mb,
            max_files: MAX_FILES,
        }
    }

    pub fn for_model(model: ModelId) -> Self {
        match model {
            ModelId::Gpt4o => Self::images(10),
            ModelId::Gpt4oMini => Self::images(5),
            ModelId::Claude35SonnetLatest | ModelId::ClaudeSonnet4 => Self::images(10),
            ModelId::ClaudeOpus4 => Self::images(20),
            ModelId::GeminiPro | ModelId::Gemini25Pro => Self::images(10),
            ModelId::Gemini20Flash | ModelId::Gemini20FlashLite => Self::images(5),
            ModelId::Gemini25Flash | ModelId::Llama31Versatile70b => Self::NONE,
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_size_mb * MB
    }

    pub fn max_total_bytes(&self) -> u64 {
        self.max_file_bytes() * AGGREGATE_FACTOR
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(&mime_type)
    }
}

/// Reject the whole set if any attachment breaks the model's policy.
pub fn validate_attachments(model: ModelId, attachments: &[Attachment]) -> Result<(), RelayError> {
    if attachments.is_empty() {
        return Ok(());
    }
    let policy = AttachmentPolicy::for_model(model);

    if attachments.len() > policy.max_files {
        return Err(RelayError::Validation(format!(
            "{} accepts at most {} attachments.",
            model, policy.max_files
        )));
    }

    for attachment in attachments {
        if !policy.allows(&attachment.mime_type) {
            return Err(RelayError::Validation(format!(
                "Attachments of type {} are not supported by {}.",
                attachment.mime_type, model
            )));
        }
        if attachment.size > policy.max_file_bytes() {
            return Err(RelayError::Validation(format!(
                "File exceeds size limit of {} MB for model {}.",
                policy.max_file_size_mb, model
            )));
        }
    }

    let total: u64 = attachments.iter().map(|a| a.size).sum();
    if total > policy.max_total_bytes() {
        return Err(RelayError::Validation(format!(
            "Attachments exceed the combined limit of {} MB for model {}.",
            policy.max_file_size_mb * AGGREGATE_FACTOR,
            model
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AttachmentId;

    fn attachment(mime_type: &str, size: u64) -> Attachment {
        Attachment::new(AttachmentId::new(), "f", mime_type, size, "/uploads/f")
    }

    #[test]
    fn test_allowed_image_passes() {
        assert!(validate_attachments(ModelId::Gpt4o, &[attachment("image/png", 2 * MB)]).is_ok());
    }

    #[test]
    fn test_mime_outside_allow_list_rejected() {
        let err = validate_attachments(ModelId::Gpt4o, &[attachment("application/pdf", 10)])
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn test_text_only_model_rejects_everything() {
        assert!(
            validate_attachments(ModelId::Llama31Versatile70b, &[attachment("image/png", 1)]).is_err()
        );
        assert!(validate_attachments(ModelId::Llama31Versatile70b, &[]).is_ok());
    }

    #[test]
    fn test_per_file_cap() {
        assert!(validate_attachments(ModelId::Gpt4oMini, &[attachment("image/jpeg", 5 * MB)]).is_ok());
        assert!(
            validate_attachments(ModelId::Gpt4oMini, &[attachment("image/jpeg", 5 * MB + 1)]).is_err()
        );
        assert!(validate_attachments(ModelId::ClaudeOpus4, &[attachment("image/gif", 20 * MB)]).is_ok());
    }

    #[test]
    fn test_aggregate_and_count_caps() {
        let five = vec![attachment("image/png", 4 * MB + MB / 2); 5];
        assert!(validate_attachments(ModelId::Gemini20Flash, &five).is_err());

        let many = vec![attachment("image/png", 1); MAX_FILES + 1];
        assert!(validate_attachments(ModelId::Gpt4o, &many).is_err());
    }
}
