//! The `StateStore` gateway trait.

use async_trait::async_trait;

use crate::{Result, record::MessageRecord};

/// Stateless façade over the object store bucket.
///
/// Every write is a full-document overwrite; there are no partial updates,
/// conditional writes, or versioning dependencies. Operations perform no
/// internal retry — the scheduling engine owns that policy.
///
/// Terminal documents are immutable once written; the engine guarantees the
/// terminal put is acknowledged before the active document is deleted, so a
/// crash between the two leaves a duplicate at worst, never a lost record.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Write the active document for a pending record.
    ///
    /// # Errors
    /// If the document cannot be serialized or the write is not acknowledged.
    async fn put_active(&self, record: &MessageRecord) -> Result<()>;

    /// Fetch and deserialize the active document for `message_id`.
    ///
    /// # Errors
    /// `StoreError::NotFound` if no such document exists; transport or
    /// decode failures otherwise.
    async fn get_active(&self, message_id: &str) -> Result<MessageRecord>;

    /// Remove the active document for `message_id`. Absence is not an error.
    ///
    /// # Errors
    /// If the delete is not acknowledged.
    async fn delete_active(&self, message_id: &str) -> Result<()>;

    /// Enumerate the message ids of every active document. Used only during
    /// recovery.
    ///
    /// # Errors
    /// If the listing fails.
    async fn list_active(&self) -> Result<Vec<String>>;

    /// Write the terminal-success document for `record`.
    ///
    /// # Errors
    /// If the document cannot be serialized or the write is not acknowledged.
    async fn put_success(&self, record: &MessageRecord) -> Result<()>;

    /// Write the terminal-failed document for `record`.
    ///
    /// # Errors
    /// If the document cannot be serialized or the write is not acknowledged.
    async fn put_failed(&self, record: &MessageRecord) -> Result<()>;

    /// Cheap liveness check, used by the health endpoint.
    ///
    /// # Errors
    /// If the store cannot currently be reached.
    async fn probe(&self) -> Result<()> {
        self.list_active().await.map(|_| ())
    }
}
