/*!
Amazon S3 payload store.

Payloads are stored as whole objects under the key `{owner_id}/{id}`.
*/

use super::aws::{call, map_sdk_error};
use super::{object_key, BlobStore};
use crate::{FragmentError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use fragments_retry::RetryPolicy;
use tracing::{debug, info};

const STORE: &str = "s3";

/// Amazon S3 implementation of [`BlobStore`]
///
/// Credentials come from the standard AWS provider chain (environment,
/// credentials file, instance or task role).
///
/// Reads fully collect the object body before returning; callers never see
/// a live stream.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    retry: RetryPolicy,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, retry: RetryPolicy) -> Self {
        let bucket = bucket.into();
        info!(bucket = %bucket, "Initialized S3 blob store");
        Self {
            client,
            bucket,
            retry,
        }
    }

    /// Build a client from a loaded SDK configuration
    ///
    /// Path-style addressing is required by most S3-compatible endpoints
    /// (LocalStack, MinIO) and is enabled with `force_path_style`.
    pub fn from_sdk_config(
        sdk_config: &SdkConfig,
        bucket: impl Into<String>,
        force_path_style: bool,
        retry: RetryPolicy,
    ) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self::new(S3Client::from_conf(config), bucket, retry)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        let key = &object_key(owner_id, id);
        let data = &data;
        debug!(bucket = %self.bucket, key = %key, size = data.len(), "Uploading fragment data");

        call(STORE, "put_object", &self.retry, || async move {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data.clone()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("put_object", e, FragmentError::DataWrite))
        })
        .await
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        let key = &object_key(owner_id, id);
        debug!(bucket = %self.bucket, key = %key, "Downloading fragment data");

        call(STORE, "get_object", &self.retry, || async move {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                    return Ok(None);
                }
                Err(err) => return Err(map_sdk_error("get_object", err, FragmentError::DataRead)),
            };

            let body = output.body.collect().await.map_err(|e| {
                FragmentError::DataRead(format!("failed to read object stream for {key}: {e}"))
            })?;
            Ok(Some(body.into_bytes()))
        })
        .await
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let key = &object_key(owner_id, id);
        debug!(bucket = %self.bucket, key = %key, "Deleting fragment data");

        call(STORE, "delete_object", &self.retry, || async move {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("delete_object", e, FragmentError::Storage))
        })
        .await
    }
}
