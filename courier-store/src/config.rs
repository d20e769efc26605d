//! Bucket location and key layout configuration.

use serde::{Deserialize, Serialize};

use crate::record::MessageRecord;

/// Where records live in the object store.
///
/// The layout is fixed:
/// - `{active_prefix}/{message_id}.json` — one per pending record
/// - `{success_prefix}/{epoch_millis}_{message_id}.json` — one per success
/// - `{failed_prefix}/{epoch_millis}_{message_id}.json` — one per dead letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket name. Required.
    pub bucket: String,

    /// Prefix for pending records.
    #[serde(default = "defaults::active_prefix")]
    pub active_prefix: String,

    /// Prefix for terminal-success documents.
    #[serde(default = "defaults::success_prefix")]
    pub success_prefix: String,

    /// Prefix for terminal-failed documents.
    #[serde(default = "defaults::failed_prefix")]
    pub failed_prefix: String,

    /// Endpoint override, for MinIO and other S3-compatible stores.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Object store region.
    #[serde(default = "defaults::region")]
    pub region: String,
}

impl StoreConfig {
    /// Configuration for `bucket` with the default prefixes and region.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            active_prefix: defaults::active_prefix(),
            success_prefix: defaults::success_prefix(),
            failed_prefix: defaults::failed_prefix(),
            endpoint_url: None,
            region: defaults::region(),
        }
    }

    /// Key of the active document for `message_id`.
    pub fn active_key(&self, message_id: &str) -> String {
        format!("{}/{message_id}.json", self.active_prefix)
    }

    /// Key of the terminal-success document for `record`.
    pub fn success_key(&self, record: &MessageRecord) -> String {
        format!(
            "{}/{}_{}.json",
            self.success_prefix,
            record.epoch_millis(),
            record.message_id
        )
    }

    /// Key of the terminal-failed document for `record`.
    pub fn failed_key(&self, record: &MessageRecord) -> String {
        format!(
            "{}/{}_{}.json",
            self.failed_prefix,
            record.epoch_millis(),
            record.message_id
        )
    }

    /// Extract the message id from an active-prefix key, if it is one.
    pub fn message_id_from_active_key(&self, key: &str) -> Option<String> {
        key.strip_prefix(&format!("{}/", self.active_prefix))
            .and_then(|rest| rest.strip_suffix(".json"))
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
    }
}

mod defaults {
    pub fn active_prefix() -> String {
        "state".to_string()
    }

    pub fn success_prefix() -> String {
        "success".to_string()
    }

    pub fn failed_prefix() -> String {
        "failed".to_string()
    }

    pub fn region() -> String {
        "us-east-1".to_string()
    }
}
