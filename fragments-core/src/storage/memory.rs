/*!
In-memory store adapters.

Both stores keep a nested `owner_id -> (id -> value)` map for the lifetime of
the process. Nothing survives a restart.
*/

use super::{BlobStore, MetadataStore};
use crate::metadata::FragmentMetadata;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type Nested<V> = RwLock<HashMap<String, BTreeMap<String, V>>>;

fn put_nested<V>(map: &Nested<V>, owner_id: &str, id: &str, value: V) {
    map.write()
        .entry(owner_id.to_string())
        .or_default()
        .insert(id.to_string(), value);
}

fn remove_nested<V>(map: &Nested<V>, owner_id: &str, id: &str) {
    let mut guard = map.write();
    if let Some(owned) = guard.get_mut(owner_id) {
        owned.remove(id);
        if owned.is_empty() {
            guard.remove(owner_id);
        }
    }
}

/// In-memory metadata store holding serialized records
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Nested<String>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put(&self, owner_id: &str, id: &str, metadata: &FragmentMetadata) -> Result<()> {
        let serialized = metadata.to_json()?;
        put_nested(&self.records, owner_id, id, serialized);
        debug!(owner_id, fragment_id = id, "Stored fragment metadata in memory");
        Ok(())
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<FragmentMetadata>> {
        let serialized = self
            .records
            .read()
            .get(owner_id)
            .and_then(|owned| owned.get(id).cloned());

        serialized
            .map(|json| FragmentMetadata::from_json(&json))
            .transpose()
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<FragmentMetadata>> {
        let serialized: Vec<String> = self
            .records
            .read()
            .get(owner_id)
            .map(|owned| owned.values().cloned().collect())
            .unwrap_or_default();

        serialized
            .iter()
            .map(|json| FragmentMetadata::from_json(json))
            .collect()
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        remove_nested(&self.records, owner_id, id);
        Ok(())
    }
}

/// In-memory payload store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Nested<Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        debug!(owner_id, fragment_id = id, size = data.len(), "Stored fragment data in memory");
        put_nested(&self.blobs, owner_id, id, data);
        Ok(())
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        Ok(self
            .blobs
            .read()
            .get(owner_id)
            .and_then(|owned| owned.get(id).cloned()))
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        remove_nested(&self.blobs, owner_id, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::now;

    fn record(owner_id: &str, id: &str) -> FragmentMetadata {
        let ts = now();
        FragmentMetadata {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            media_type: "text/plain".to_string(),
            size: 0,
            created: ts,
            updated: ts,
        }
    }

    #[tokio::test]
    async fn test_metadata_put_get_delete() {
        let store = MemoryMetadataStore::new();
        let metadata = record("a", "b");

        store.put("a", "b", &metadata).await.unwrap();
        assert_eq!(store.get("a", "b").await.unwrap(), Some(metadata));

        store.delete("a", "b").await.unwrap();
        assert_eq!(store.get("a", "b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_get_missing_owner_or_id() {
        let store = MemoryMetadataStore::new();
        store.put("a", "b", &record("a", "b")).await.unwrap();

        assert!(store.get("x", "b").await.unwrap().is_none());
        assert!(store.get("a", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_delete_is_idempotent() {
        let store = MemoryMetadataStore::new();
        assert!(store.delete("nobody", "nothing").await.is_ok());

        store.put("a", "b", &record("a", "b")).await.unwrap();
        store.delete("a", "b").await.unwrap();
        assert!(store.delete("a", "b").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_by_owner_is_scoped_and_ordered() {
        let store = MemoryMetadataStore::new();
        store.put("a", "2", &record("a", "2")).await.unwrap();
        store.put("a", "1", &record("a", "1")).await.unwrap();
        store.put("b", "3", &record("b", "3")).await.unwrap();

        let ids: Vec<String> = store
            .query_by_owner("a")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);

        assert!(store.query_by_owner("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = MemoryMetadataStore::new();
        let mut metadata = record("a", "b");
        store.put("a", "b", &metadata).await.unwrap();

        metadata.size = 42;
        store.put("a", "b", &metadata).await.unwrap();

        assert_eq!(store.get("a", "b").await.unwrap().unwrap().size, 42);
        assert_eq!(store.query_by_owner("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blob_put_get_delete() {
        let store = MemoryBlobStore::new();
        let data = Bytes::from_static(b"hello");

        store.put("a", "b", data.clone()).await.unwrap();
        assert_eq!(store.get("a", "b").await.unwrap(), Some(data));

        store.delete("a", "b").await.unwrap();
        assert_eq!(store.get("a", "b").await.unwrap(), None);
        assert!(store.delete("a", "b").await.is_ok());
    }

    #[tokio::test]
    async fn test_blob_empty_payload_is_distinct_from_missing() {
        let store = MemoryBlobStore::new();
        store.put("a", "b", Bytes::new()).await.unwrap();

        assert_eq!(store.get("a", "b").await.unwrap(), Some(Bytes::new()));
        assert_eq!(store.get("a", "c").await.unwrap(), None);
    }
}
