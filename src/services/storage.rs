use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::models::{FetchedObject, StorageLocator};

/// Blob store seen by the pipeline. Implementations are shared read-only
/// across concurrently processed records.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Read the full content of one object. A missing object or any
    /// non-success response is an error; nothing is retried.
    async fn fetch_object(&self, locator: &StorageLocator) -> Result<FetchedObject, StorageError>;

    /// Write one object in a single attempt, attaching `tags` (may be empty).
    async fn upload_object(
        &self,
        locator: &StorageLocator,
        data: Vec<u8>,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError>;
}

pub struct S3StorageService {
    client: Client,
}

impl S3StorageService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Encode tags the way the `x-amz-tagging` header expects them.
pub fn encode_tagging(tags: &BTreeMap<String, String>) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    serde_urlencoded::to_string(tags).ok()
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn fetch_object(&self, locator: &StorageLocator) -> Result<FetchedObject, StorageError> {
        let res = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await;

        let output = match res {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound {
                        bucket: locator.bucket.clone(),
                        key: locator.key.clone(),
                    });
                }
                return Err(StorageError::Transport {
                    bucket: locator.bucket.clone(),
                    key: locator.key.clone(),
                    reason: service_error.to_string(),
                });
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Transport {
                bucket: locator.bucket.clone(),
                key: locator.key.clone(),
                reason: format!("failed to read body: {}", e),
            })?
            .to_vec();

        Ok(FetchedObject {
            locator: locator.clone(),
            bytes,
        })
    }

    async fn upload_object(
        &self,
        locator: &StorageLocator,
        data: Vec<u8>,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let res = self
            .client
            .put_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .content_type("application/zip")
            .set_tagging(encode_tagging(tags))
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            tracing::debug!("S3 put_object failed: dest={}, error={:?}", locator, e);
            return Err(StorageError::Transport {
                bucket: locator.bucket.clone(),
                key: locator.key.clone(),
                reason: e.into_service_error().to_string(),
            });
        }
        Ok(())
    }
}
