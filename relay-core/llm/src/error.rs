use thiserror::Error;

/// Failures surfaced by vendor adapters.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The vendor has no API key configured. Raised before any network I/O.
    #[error("missing credential for {0}")]
    MissingCredential(&'static str),

    #[error("vendor returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("vendor returned {0} with an empty body")]
    EmptyBody(reqwest::StatusCode),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed vendor payload: {0}")]
    Decode(String),

    /// An error reported in-band by the vendor inside an otherwise healthy stream.
    #[error("vendor error: {0}")]
    Vendor(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl LlmError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        LlmError::Decode(e.to_string())
    }
}
