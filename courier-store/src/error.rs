//! Error types for state store operations.

use thiserror::Error;

/// Top-level store error type.
///
/// The gateway performs no internal retry; every failure is surfaced so the
/// engine can decide policy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or object store transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Credential acquisition or signing failure.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Document could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No document exists under the requested key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store answered with a status the gateway does not expect.
    #[error("unexpected status {status} for {key}")]
    UnexpectedStatus { key: String, status: u16 },

    /// Invalid bucket, region, or endpoint configuration.
    #[error("invalid store configuration: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Returns `true` if the error means the key simply does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for decode failures, which recovery may be configured
    /// to skip rather than abort on.
    #[must_use]
    pub const fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

impl From<s3::error::S3Error> for StoreError {
    fn from(error: s3::error::S3Error) -> Self {
        match error {
            s3::error::S3Error::Credentials(e) => Self::Credentials(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
