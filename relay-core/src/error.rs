use thiserror::Error;

/// Request-level failures. Only `Validation` and `Auth` are expected before
/// streaming starts; everything after that is absorbed into the event stream.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("message is not resumable")]
    NotResumable,

    /// A generation still owns the message, possibly one that has been told
    /// to stop and is settling the row.
    #[error("message is still being generated")]
    InProgress,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
