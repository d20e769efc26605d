//! In-memory state store backend.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;

use crate::{
    StoreConfig, StoreError,
    gateway::StateStore,
    record::{MessageRecord, MessageStatus},
};

/// State store keeping documents in a `HashMap` keyed by the full object key.
///
/// Documents are stored as their serialized JSON bodies, so the backend
/// exercises the same serialization path as the S3 backend and tests can
/// assert on the exact key layout and raw document contents.
///
/// Intended for tests and endpoint-less local runs; clones share the
/// underlying map.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    objects: Arc<RwLock<HashMap<String, String>>>,
    config: StoreConfig,
}

impl MemoryStateStore {
    /// Create an empty store with the given key layout.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// The key layout this store was built with.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Raw document body under `key`, if present.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Parsed document under `key`, if present and decodable.
    pub fn document(&self, key: &str) -> Option<MessageRecord> {
        self.raw(key)
            .and_then(|body| serde_json::from_str(&body).ok())
    }

    /// All keys under `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Insert a raw body under `key`, bypassing serialization. For tests
    /// that plant corrupt or hand-written documents.
    pub fn insert_raw(&self, key: impl Into<String>, body: impl Into<String>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), body.into());
    }

    /// Total number of stored documents.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no documents at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, key: String, record: &MessageRecord) -> crate::Result<()> {
        let body = serde_json::to_string(record)?;
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, body);
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put_active(&self, record: &MessageRecord) -> crate::Result<()> {
        self.put(self.config.active_key(&record.message_id), record)
    }

    async fn get_active(&self, message_id: &str) -> crate::Result<MessageRecord> {
        let key = self.config.active_key(message_id);
        let body = self.raw(&key).ok_or(StoreError::NotFound(key))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete_active(&self, message_id: &str) -> crate::Result<()> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.config.active_key(message_id));
        Ok(())
    }

    async fn list_active(&self) -> crate::Result<Vec<String>> {
        Ok(self
            .keys_with_prefix(&format!("{}/", self.config.active_prefix))
            .iter()
            .filter_map(|key| self.config.message_id_from_active_key(key))
            .collect())
    }

    async fn put_success(&self, record: &MessageRecord) -> crate::Result<()> {
        debug_assert_eq!(record.status, MessageStatus::Succeeded);
        self.put(self.config.success_key(record), record)
    }

    async fn put_failed(&self, record: &MessageRecord) -> crate::Result<()> {
        debug_assert_eq!(record.status, MessageStatus::Failed);
        self.put(self.config.failed_key(record), record)
    }
}
