//! The fixed vendor and model catalogue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MB: u64 = 1024 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    OpenAI,
    Anthropic,
    Gemini,
    Groq,
}

/// What a vendor accepts in a request, used to materialize attachments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VendorCapabilities {
    pub images: bool,
    pub documents: bool,
    /// Images may be passed as an external https URL instead of bytes.
    pub image_references: bool,
    /// Documents may be passed as an external https URL instead of bytes.
    pub document_references: bool,
    /// Documents larger than this are never inlined.
    pub inline_document_limit: u64,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Vendor::OpenAI, Vendor::Anthropic, Vendor::Gemini, Vendor::Groq];

    pub fn name(&self) -> &'static str {
        match self {
            Vendor::OpenAI => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Gemini => "gemini",
            Vendor::Groq => "groq",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Vendor::OpenAI => "OPENAI_API_KEY",
            Vendor::Anthropic => "ANTHROPIC_API_KEY",
            Vendor::Gemini => "GEMINI_API_KEY",
            Vendor::Groq => "GROQ_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Vendor::OpenAI => "OPENAI_BASE_URL",
            Vendor::Anthropic => "ANTHROPIC_BASE_URL",
            Vendor::Gemini => "GEMINI_BASE_URL",
            Vendor::Groq => "GROQ_BASE_URL",
        }
    }

    pub fn capabilities(&self) -> VendorCapabilities {
        match self {
            Vendor::OpenAI => VendorCapabilities {
                images: true,
                documents: false,
                image_references: true,
                document_references: false,
                inline_document_limit: 0,
            },
            Vendor::Anthropic => VendorCapabilities {
                images: true,
                documents: true,
                image_references: true,
                document_references: true,
                inline_document_limit: 32 * MB,
            },
            // Gemini only accepts images inline; documents over the ceiling
            // go through `fileData` references.
            Vendor::Gemini => VendorCapabilities {
                images: true,
                documents: true,
                image_references: false,
                document_references: true,
                inline_document_limit: 20 * MB,
            },
            Vendor::Groq => VendorCapabilities {
                images: false,
                documents: false,
                image_references: false,
                document_references: false,
                inline_document_limit: 0,
            },
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ModelId {
    Gpt4o,
    #[default]
    Gpt4oMini,
    Claude35SonnetLatest,
    ClaudeSonnet4,
    ClaudeOpus4,
    Llama31Versatile70b,
    GeminiPro,
    Gemini25Pro,
    Gemini25Flash,
    Gemini20Flash,
    Gemini20FlashLite,
}

impl ModelId {
    pub const ALL: [ModelId; 11] = [
        ModelId::Gpt4o,
        ModelId::Gpt4oMini,
        ModelId::Claude35SonnetLatest,
        ModelId::ClaudeSonnet4,
        ModelId::ClaudeOpus4,
        ModelId::Llama31Versatile70b,
        ModelId::GeminiPro,
        ModelId::Gemini25Pro,
        ModelId::Gemini25Flash,
        ModelId::Gemini20Flash,
        ModelId::Gemini20FlashLite,
    ];

    /// The vendor-side model name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4o => "gpt-4o",
            ModelId::Gpt4oMini => "gpt-4o-mini",
            ModelId::Claude35SonnetLatest => "claude-3-5-sonnet-latest",
            ModelId::ClaudeSonnet4 => "claude-sonnet-4-20250514",
            ModelId::ClaudeOpus4 => "claude-opus-4-20250514",
            ModelId::Llama31Versatile70b => "llama-3.1-70b-versatile",
            ModelId::GeminiPro => "gemini-pro",
            ModelId::Gemini25Pro => "gemini-2.5-pro",
            ModelId::Gemini25Flash => "gemini-2.5-flash",
            ModelId::Gemini20Flash => "gemini-2.0-flash",
            ModelId::Gemini20FlashLite => "gemini-2.0-flash-lite",
        }
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            ModelId::Gpt4o | ModelId::Gpt4oMini => Vendor::OpenAI,
            ModelId::Claude35SonnetLatest | ModelId::ClaudeSonnet4 | ModelId::ClaudeOpus4 => {
                Vendor::Anthropic
            }
            ModelId::Llama31Versatile70b => Vendor::Groq,
            ModelId::GeminiPro
            | ModelId::Gemini25Pro
            | ModelId::Gemini25Flash
            | ModelId::Gemini20Flash
            | ModelId::Gemini20FlashLite => Vendor::Gemini,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model: {0}")]
pub struct UnknownModel(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vendor: {0}")]
pub struct UnknownVendor(pub String);

impl FromStr for Vendor {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vendor::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownVendor(s.to_string()))
    }
}

impl FromStr for ModelId {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

impl Serialize for ModelId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
