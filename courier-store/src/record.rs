//! The persisted data model: messages and their scheduling records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Caller-supplied message envelope. Never mutated after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier supplied by the caller.
    pub message_id: String,
    /// Message body to hand to the sender.
    pub content: String,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Create a message with no metadata.
    pub fn new(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Lifecycle status of a record.
///
/// A record is `Pending` exactly while it is live in the scheduling engine;
/// the terminal states are only ever written under the success/failed
/// prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Succeeded,
    Failed,
}

/// The unit that is persisted to the object store and scheduled in memory.
///
/// Timestamps are wall-clock seconds since the Unix epoch, with fractional
/// precision. `attempt_count` counts completed *failing* sender invocations:
/// a success finalizes the record without touching the counter, so a terminal
/// success document records how many failures preceded delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Primary key; equals `message.message_id`.
    pub message_id: String,
    /// The original payload.
    pub message: Message,
    /// Completed failing sender invocations. 0 before the first attempt.
    pub attempt_count: u32,
    /// Wall-clock instant at which the next attempt is due.
    pub next_retry_at: f64,
    pub status: MessageStatus,
    /// Set once at submission.
    pub created_at: f64,
    /// Refreshed on every state transition.
    pub updated_at: f64,
}

impl MessageRecord {
    /// Create the record for a freshly submitted message.
    ///
    /// The first attempt is due immediately (`next_retry_at == created_at`).
    pub fn new(message: Message, now: f64) -> Self {
        Self {
            message_id: message.message_id.clone(),
            message,
            attempt_count: 0,
            next_retry_at: now,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a completed failing sender invocation.
    pub fn record_failure(&mut self, now: f64) {
        self.attempt_count += 1;
        self.updated_at = now;
    }

    /// Schedule the next attempt.
    pub fn schedule_retry(&mut self, next_retry_at: f64) {
        self.next_retry_at = next_retry_at;
    }

    /// Transition to the terminal success state.
    pub fn mark_succeeded(&mut self, now: f64) {
        self.status = MessageStatus::Succeeded;
        self.updated_at = now;
    }

    /// Transition to the terminal failed state.
    pub fn mark_failed(&mut self, now: f64) {
        self.status = MessageStatus::Failed;
        self.updated_at = now;
    }

    /// `updated_at` in integral milliseconds, used in terminal document keys
    /// so listings sort chronologically.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "epoch millis fit u64 until the year 584556019"
    )]
    pub fn epoch_millis(&self) -> u64 {
        (self.updated_at * 1000.0).round() as u64
    }
}
