//! Configuration for store backend selection and settings
//!
//! A [`StoreConfig`] value is handed to [`crate::factory::create_stores`];
//! nothing in the core library reads the environment on its own.

use fragments_retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Enumeration of supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local maps, lost on exit
    Memory,
    /// DynamoDB metadata table plus S3 payload bucket
    Aws,
}

/// Bounded fixed-delay retry settings for durable store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: fragments_retry::DEFAULT_MAX_ATTEMPTS,
            delay_ms: fragments_retry::DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Configuration structure for store backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// S3 bucket holding fragment payloads (required for `Aws`)
    pub s3_bucket: Option<String>,
    /// DynamoDB table holding fragment metadata (required for `Aws`)
    pub dynamodb_table: Option<String>,
    /// AWS region (optional, defaults to the environment)
    pub region: Option<String>,
    /// Endpoint override for S3-compatible and DynamoDB-compatible services
    pub endpoint_url: Option<String>,
    /// Create the metadata table on startup if it does not exist
    #[serde(default)]
    pub provision_table: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            s3_bucket: None,
            dynamodb_table: None,
            region: None,
            endpoint_url: None,
            provision_table: false,
            retry: RetryConfig::default(),
        }
    }

    pub fn aws(bucket: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Aws,
            s3_bucket: Some(bucket.into()),
            dynamodb_table: Some(table.into()),
            ..Self::memory()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_provisioning(mut self, provision_table: bool) -> Self {
        self.provision_table = provision_table;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build a configuration from process environment variables
    ///
    /// `FRAGMENTS_BACKEND` selects `memory` (default) or `aws`; the AWS
    /// backend reads `AWS_S3_BUCKET_NAME`, `AWS_DYNAMODB_TABLE_NAME`,
    /// `AWS_REGION` and `AWS_ENDPOINT_URL`. The result is not validated.
    pub fn from_env() -> crate::Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let backend = match var("FRAGMENTS_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("aws") => StoreBackend::Aws,
            Some(other) => {
                return Err(crate::FragmentError::validation(format!(
                    "unknown FRAGMENTS_BACKEND '{other}', expected 'memory' or 'aws'"
                )))
            }
        };

        Ok(Self {
            backend,
            s3_bucket: var("AWS_S3_BUCKET_NAME"),
            dynamodb_table: var("AWS_DYNAMODB_TABLE_NAME"),
            region: var("AWS_REGION"),
            endpoint_url: var("AWS_ENDPOINT_URL"),
            ..Self::memory()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(crate::FragmentError::validation(
                "retry max_attempts must be at least 1",
            ));
        }

        match self.backend {
            StoreBackend::Aws => {
                if self.s3_bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(crate::FragmentError::validation(
                        "AWS backend requires a valid S3 bucket name",
                    ));
                }
                if self.dynamodb_table.as_deref().map_or(true, str::is_empty) {
                    return Err(crate::FragmentError::validation(
                        "AWS backend requires a valid DynamoDB table name",
                    ));
                }
            }
            StoreBackend::Memory => {}
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}
