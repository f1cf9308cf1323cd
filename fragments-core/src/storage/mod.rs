/*!
Storage ports for fragment persistence.

Metadata and payload live in two independent stores keyed by
`(owner_id, id)`. Each port has an in-memory adapter and a durable AWS
adapter (DynamoDB for metadata, S3 for payloads); the fragment entity only
ever talks to the traits.
*/

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "aws")]
pub mod dynamodb;
pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;

use crate::metadata::FragmentMetadata;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Key-value persistence for fragment descriptors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record for `(owner_id, id)`
    async fn put(&self, owner_id: &str, id: &str, metadata: &FragmentMetadata) -> Result<()>;

    /// Read a record; `Ok(None)` when absent
    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<FragmentMetadata>>;

    /// All records for an owner, ordered by id; empty when the owner has none
    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<FragmentMetadata>>;

    /// Remove a record. Deleting an absent key succeeds.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<()>;
}

/// Key-value persistence for raw fragment payloads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Insert or replace the payload for `(owner_id, id)`
    async fn put(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()>;

    /// Read a complete payload; `Ok(None)` when absent
    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>>;

    /// Remove a payload. Deleting an absent key succeeds.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<()>;
}

/// The pair of stores a fragment is persisted through
///
/// Chosen once at startup by [`crate::factory::create_stores`] and cloned
/// into every fragment.
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub data: Arc<dyn BlobStore>,
}

impl Stores {
    pub fn new(metadata: Arc<dyn MetadataStore>, data: Arc<dyn BlobStore>) -> Self {
        Self { metadata, data }
    }

    /// Fresh, empty in-memory stores
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(memory::MemoryMetadataStore::new()),
            Arc::new(memory::MemoryBlobStore::new()),
        )
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Object key for a payload in a flat namespace
pub fn object_key(owner_id: &str, id: &str) -> String {
    format!("{owner_id}/{id}")
}

// Re-export types for convenience
#[cfg(feature = "aws")]
pub use dynamodb::DynamoMetadataStore;
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
#[cfg(feature = "aws")]
pub use s3::S3BlobStore;
