/*!
Store selection.

The backend is decided once, from an explicit [`StoreConfig`], and the
resulting [`Stores`] pair is shared by every fragment for the lifetime of the
process.
*/

use crate::config::{StoreBackend, StoreConfig};
use crate::storage::Stores;
use crate::Result;
use tracing::info;

/// Create the metadata and payload stores described by `config`
///
/// # Example
/// ```rust,no_run
/// use fragments_core::{create_stores, StoreConfig};
///
/// # async fn run() -> fragments_core::Result<()> {
/// let stores = create_stores(&StoreConfig::memory()).await?;
///
/// let aws = StoreConfig::aws("fragments-data", "fragments")
///     .with_region("us-east-1");
/// let stores = create_stores(&aws).await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_stores(config: &StoreConfig) -> Result<Stores> {
    config.validate()?;

    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory fragment stores");
            Ok(Stores::in_memory())
        }
        StoreBackend::Aws => aws_stores(config).await,
    }
}

#[cfg(feature = "aws")]
async fn aws_stores(config: &StoreConfig) -> Result<Stores> {
    use crate::storage::aws::load_sdk_config;
    use crate::storage::{DynamoMetadataStore, S3BlobStore};
    use crate::FragmentError;
    use std::sync::Arc;

    let bucket = config.s3_bucket.clone().ok_or_else(|| {
        FragmentError::validation("S3 bucket name is required for the AWS backend")
    })?;
    let table = config.dynamodb_table.clone().ok_or_else(|| {
        FragmentError::validation("DynamoDB table name is required for the AWS backend")
    })?;
    let retry = config.retry.policy();

    let sdk_config =
        load_sdk_config(config.region.as_deref(), config.endpoint_url.as_deref()).await;

    let metadata = DynamoMetadataStore::from_sdk_config(&sdk_config, table, retry.clone());
    if config.provision_table {
        metadata.ensure_table().await?;
    }
    let data = S3BlobStore::from_sdk_config(
        &sdk_config,
        bucket,
        config.endpoint_url.is_some(),
        retry,
    );

    info!(
        bucket = %data.bucket(),
        table = %metadata.table_name(),
        region = ?config.region,
        endpoint = ?config.endpoint_url,
        "Using AWS fragment stores"
    );
    Ok(Stores::new(Arc::new(metadata), Arc::new(data)))
}

#[cfg(not(feature = "aws"))]
async fn aws_stores(_config: &StoreConfig) -> Result<Stores> {
    Err(crate::FragmentError::validation(
        "AWS backend requested but fragments-core was built without the `aws` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{now, FragmentMetadata};
    use crate::FragmentError;

    #[tokio::test]
    async fn test_memory_backend_creates_working_stores() {
        let stores = create_stores(&StoreConfig::memory()).await.unwrap();
        let ts = now();
        let metadata = FragmentMetadata {
            id: "a".into(),
            owner_id: "o".into(),
            media_type: "text/plain".into(),
            size: 0,
            created: ts,
            updated: ts,
        };
        stores.metadata.put("o", "a", &metadata).await.unwrap();
        assert_eq!(stores.metadata.get("o", "a").await.unwrap(), Some(metadata));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let mut config = StoreConfig::aws("bucket", "table");
        config.s3_bucket = None;
        let err = create_stores(&config).await.unwrap_err();
        assert!(matches!(err, FragmentError::Validation(_)));
    }

    #[cfg(not(feature = "aws"))]
    #[tokio::test]
    async fn test_aws_without_feature_is_validation_error() {
        let err = create_stores(&StoreConfig::aws("bucket", "table"))
            .await
            .unwrap_err();
        assert!(matches!(err, FragmentError::Validation(_)));
    }
}
