//! S3-compatible state store backend.

use async_trait::async_trait;
use s3::error::S3Error;
use s3::{Bucket, Region, creds::Credentials};
use tracing::debug;

use crate::{
    StoreConfig, StoreError,
    gateway::StateStore,
    record::{MessageRecord, MessageStatus},
};

/// State store backed by an S3-compatible bucket.
///
/// Credentials come from the environment (`AWS_ACCESS_KEY_ID` /
/// `AWS_SECRET_ACCESS_KEY`, instance profiles, the usual chain). When
/// `endpoint_url` is set, a custom region with path-style addressing is
/// used so MinIO and other local simulators work unchanged.
#[derive(Debug, Clone)]
pub struct S3StateStore {
    bucket: Box<Bucket>,
    config: StoreConfig,
}

impl S3StateStore {
    /// Build the bucket handle from configuration.
    ///
    /// # Errors
    /// `StoreError::Credentials` when the credential chain yields nothing,
    /// `StoreError::Configuration` for an unparseable region.
    pub fn connect(config: StoreConfig) -> crate::Result<Self> {
        let credentials =
            Credentials::default().map_err(|e| StoreError::Credentials(e.to_string()))?;

        let region = config.endpoint_url.as_ref().map_or_else(
            || {
                config
                    .region
                    .parse::<Region>()
                    .map_err(|e| StoreError::Configuration(format!("invalid region: {e}")))
            },
            |endpoint| {
                Ok(Region::Custom {
                    region: config.region.clone(),
                    endpoint: endpoint.clone(),
                })
            },
        )?;

        let bucket = Bucket::new(&config.bucket, region, credentials)?.with_path_style();

        Ok(Self { bucket, config })
    }

    async fn put_document(&self, key: &str, record: &MessageRecord) -> crate::Result<()> {
        let body = serde_json::to_vec(record)?;
        let response = self.bucket.put_object(key, &body).await?;

        if response.status_code() != 200 {
            return Err(StoreError::UnexpectedStatus {
                key: key.to_string(),
                status: response.status_code(),
            });
        }

        debug!(key, bytes = body.len(), "document written");
        Ok(())
    }
}

#[async_trait]
impl StateStore for S3StateStore {
    async fn put_active(&self, record: &MessageRecord) -> crate::Result<()> {
        self.put_document(&self.config.active_key(&record.message_id), record)
            .await
    }

    async fn get_active(&self, message_id: &str) -> crate::Result<MessageRecord> {
        let key = self.config.active_key(message_id);

        match self.bucket.get_object(&key).await {
            Ok(data) if data.status_code() == 200 => Ok(serde_json::from_slice(data.as_slice())?),
            Ok(data) if data.status_code() == 404 => Err(StoreError::NotFound(key)),
            Ok(data) => Err(StoreError::UnexpectedStatus {
                key,
                status: data.status_code(),
            }),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(StoreError::NotFound(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_active(&self, message_id: &str) -> crate::Result<()> {
        let key = self.config.active_key(message_id);

        match self.bucket.delete_object(&key).await {
            // 404 means the document is already gone, which is fine
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_active(&self) -> crate::Result<Vec<String>> {
        let prefix = format!("{}/", self.config.active_prefix);
        let pages = self.bucket.list(prefix, None).await?;

        let mut ids: Vec<String> = pages
            .iter()
            .flat_map(|page| page.contents.iter())
            .filter_map(|object| self.config.message_id_from_active_key(&object.key))
            .collect();
        ids.sort();

        Ok(ids)
    }

    async fn put_success(&self, record: &MessageRecord) -> crate::Result<()> {
        debug_assert_eq!(record.status, MessageStatus::Succeeded);
        self.put_document(&self.config.success_key(record), record)
            .await
    }

    async fn put_failed(&self, record: &MessageRecord) -> crate::Result<()> {
        debug_assert_eq!(record.status, MessageStatus::Failed);
        self.put_document(&self.config.failed_key(record), record)
            .await
    }
}
