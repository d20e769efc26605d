//! Typed error handling for the scheduling engine.

use courier_store::StoreError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Submission arrived after shutdown was requested.
    #[error("scheduler is shutting down")]
    ShutdownInProgress,

    /// The message identifier was empty.
    #[error("message identifier must not be empty")]
    EmptyMessageId,

    /// A record with this identifier is already live in the engine.
    #[error("message {0} is already pending")]
    DuplicateMessage(String),

    /// Engine construction was given an invalid configuration.
    #[error("invalid scheduler configuration: {0}")]
    Configuration(String),

    /// The dispatcher task terminated abnormally.
    #[error("dispatcher terminated abnormally: {0}")]
    DispatcherFailed(String),

    /// A state store operation failed.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

impl SchedulerError {
    /// Returns `true` if the submission was rejected because the engine is
    /// stopping.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownInProgress)
    }
}

/// Errors that abort startup recovery.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The active prefix could not be enumerated.
    #[error("failed to list active records: {0}")]
    List(#[source] StoreError),

    /// An active record could not be loaded.
    #[error("failed to load active record {message_id}: {source}")]
    Load {
        message_id: String,
        #[source]
        source: StoreError,
    },
}

/// Failure reported by a sender implementation. The engine maps these to
/// transient delivery failures.
#[derive(Debug, Error)]
#[error("sender failure: {0}")]
pub struct SenderError(pub String);
