//! Turns stored attachment references into vendor-ready content blocks.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use llm::{ContentBlock, MediaSource, Vendor, VendorCapabilities};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::storage::Attachment;

/// Reads the bytes behind an attachment locator.
#[async_trait]
pub trait BlobReader: Send + Sync {
    async fn read(&self, locator: &str) -> anyhow::Result<Vec<u8>>;
}

/// Resolves locators against the directory uploads are served from.
///
/// `/uploads/a.png` and `http://host/uploads/a.png` both map to
/// `<public_dir>/uploads/a.png`.
#[derive(Clone, Debug)]
pub struct FsBlobReader {
    public_dir: PathBuf,
}

impl FsBlobReader {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        FsBlobReader {
            public_dir: public_dir.into(),
        }
    }

    fn resolve(&self, locator: &str) -> anyhow::Result<PathBuf> {
        let path = locator_path(locator)
            .ok_or_else(|| anyhow::anyhow!("unresolvable attachment locator: {}", locator))?;
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("attachment locator escapes the uploads directory: {}", locator);
        }
        Ok(self.public_dir.join(relative))
    }
}

#[async_trait]
impl BlobReader for FsBlobReader {
    async fn read(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(locator)?;
        Ok(tokio::fs::read(&path).await?)
    }
}

/// The path part of a locator, without query or fragment.
fn locator_path(locator: &str) -> Option<&str> {
    let path = if locator.starts_with('/') {
        locator
    } else {
        let (_, rest) = locator.split_once("://")?;
        &rest[rest.find('/')?..]
    };
    path.split(['?', '#']).next()
}

fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    if host.starts_with('[') {
        return host.split(']').next().map(|h| &h[1..]);
    }
    host.split(':').next()
}

/// True for TLS URLs whose host is not a loopback name.
fn is_public_https(url: &str) -> bool {
    url.starts_with("https://")
        && host_of(url)
            .is_some_and(|host| !matches!(host, "localhost" | "127.0.0.1" | "::1" | ""))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttachmentKind {
    Image,
    Document,
}

impl AttachmentKind {
    fn of(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("image/") {
            Some(AttachmentKind::Image)
        } else if mime_type == "application/pdf" {
            Some(AttachmentKind::Document)
        } else {
            None
        }
    }

    fn block(self, source: MediaSource) -> ContentBlock {
        match self {
            AttachmentKind::Image => ContentBlock::Image { source },
            AttachmentKind::Document => ContentBlock::Document { source },
        }
    }
}

pub struct AttachmentMaterializer {
    reader: Arc<dyn BlobReader>,
    /// Origin used to turn relative locators into absolute URLs.
    public_base_url: Option<String>,
}

impl AttachmentMaterializer {
    pub fn new(reader: Arc<dyn BlobReader>, public_base_url: Option<String>) -> Self {
        AttachmentMaterializer {
            reader,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Build content blocks for `vendor`. Attachments the vendor cannot take
    /// in any form are left out; the stored metadata is untouched.
    pub async fn materialize(&self, vendor: Vendor, attachments: &[Attachment]) -> Vec<ContentBlock> {
        let capabilities = vendor.capabilities();
        let mut blocks = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            match self.materialize_one(&capabilities, attachment).await {
                Some(block) => blocks.push(block),
                None => debug!(
                    attachment_id = %attachment.id,
                    mime_type = %attachment.mime_type,
                    vendor = %vendor,
                    "attachment dropped from vendor payload"
                ),
            }
        }
        blocks
    }

    fn absolute_url(&self, locator: &str) -> Option<String> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Some(locator.to_string());
        }
        if locator.starts_with('/') {
            return self
                .public_base_url
                .as_ref()
                .map(|base| format!("{}{}", base, locator));
        }
        None
    }

    async fn materialize_one(
        &self,
        capabilities: &VendorCapabilities,
        attachment: &Attachment,
    ) -> Option<ContentBlock> {
        let kind = AttachmentKind::of(&attachment.mime_type)?;
        let (supported, references, inline_limit) = match kind {
            AttachmentKind::Image => (capabilities.images, capabilities.image_references, None),
            AttachmentKind::Document => (
                capabilities.documents,
                capabilities.document_references,
                Some(capabilities.inline_document_limit),
            ),
        };
        if !supported {
            return None;
        }

        let reference = self
            .absolute_url(&attachment.locator)
            .filter(|_| references)
            .map(|url| MediaSource::Url {
                mime_type: attachment.mime_type.clone(),
                url,
            });

        if let Some(MediaSource::Url { url, .. }) = &reference {
            if is_public_https(url) {
                return reference.map(|source| kind.block(source));
            }
        }

        if inline_limit.is_none_or(|limit| attachment.size <= limit) {
            match self.reader.read(&attachment.locator).await {
                Ok(bytes) => {
                    return Some(kind.block(MediaSource::Base64 {
                        mime_type: attachment.mime_type.clone(),
                        data: STANDARD.encode(bytes),
                    }));
                }
                Err(e) => warn!(
                    attachment_id = %attachment.id,
                    error = %e,
                    "failed to read attachment bytes"
                ),
            }
        }

        reference.map(|source| kind.block(source))
    }
}
