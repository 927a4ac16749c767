//! Error types for Keymint.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Issuance errors
    #[error("license subject must not be empty")]
    EmptySubject,

    // Key decoding errors
    #[error("invalid license key format: {0}")]
    MalformedKey(String),

    #[error("invalid license signature")]
    SignatureMismatch,

    // Configuration errors
    #[error("signing secret not configured: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
