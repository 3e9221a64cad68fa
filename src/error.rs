use std::error::Error as StdError;

use thiserror::Error;

/// Bardic's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Bardic's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs. Internally we still use `anyhow` for context
/// chains and convert at the public boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value makes the run impossible (checked before any generation).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transcript for a source could not be obtained.
    #[error("transcript unavailable for '{source_id}': {message}")]
    TranscriptUnavailable { source_id: String, message: String },

    /// The selected excerpt contains no transcript windows, so there is nothing to score.
    #[error("no dialog windows in excerpt of '{0}'")]
    EmptyExcerpt(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors typed when they travelled through an `anyhow` chain.
        match err.downcast::<Error>() {
            Ok(typed) => typed,
            Err(err) => Self::Message(format!("{err:#}")),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
