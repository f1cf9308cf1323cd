/*!
The fragment entity.

A [`Fragment`] is its metadata record plus the [`Stores`] it is persisted
through. Construction validates the record; nothing reaches a store until
[`Fragment::save`] or [`Fragment::set_data`] is called.

Write ordering across the two stores is fixed:

- `set_data` writes the payload, then the metadata advertising its size.
- `delete` removes the payload, then the metadata.

A reader may therefore see metadata whose payload is gone (reads as an empty
payload) but never a size advertised for bytes that were not yet written.
*/

use crate::convert;
use crate::media::MediaKind;
use crate::metadata::{next_after, now, FragmentMetadata};
use crate::storage::Stores;
use crate::{FragmentError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Construction input for a new fragment
///
/// `size` is signed so that a negative value can be rejected rather than
/// being unrepresentable.
#[derive(Debug, Clone, Default)]
pub struct FragmentInit {
    pub id: Option<String>,
    pub owner_id: String,
    pub media_type: String,
    pub size: i64,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FragmentInit {
    pub fn new(owner_id: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            media_type: media_type.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }
}

/// Result of [`Fragment::by_owner`]
#[derive(Debug, Clone)]
pub enum Listing {
    Ids(Vec<String>),
    Fragments(Vec<Fragment>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Ids(ids) => ids.len(),
            Listing::Fragments(fragments) => fragments.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    metadata: FragmentMetadata,
    kind: MediaKind,
    stores: Stores,
}

impl Fragment {
    /// Validate `init` and build an unsaved fragment
    pub fn new(stores: &Stores, init: FragmentInit) -> Result<Self> {
        if init.owner_id.is_empty() {
            return Err(FragmentError::validation("ownerId is required"));
        }
        if init.media_type.is_empty() {
            return Err(FragmentError::validation("type is required"));
        }
        let size = u64::try_from(init.size).map_err(|_| {
            FragmentError::validation(format!("size cannot be negative: {}", init.size))
        })?;

        let created = init.created.unwrap_or_else(now);
        let metadata = FragmentMetadata {
            id: init
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            owner_id: init.owner_id,
            media_type: init.media_type,
            size,
            created,
            updated: init.updated.unwrap_or(created),
        };
        Self::from_metadata(stores, metadata)
    }

    /// Hydrate a fragment from a stored record
    pub fn from_metadata(stores: &Stores, metadata: FragmentMetadata) -> Result<Self> {
        metadata.validate()?;
        let kind = metadata.kind()?;
        Ok(Self {
            metadata,
            kind,
            stores: stores.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn owner_id(&self) -> &str {
        &self.metadata.owner_id
    }

    /// Declared media type, parameters included
    pub fn media_type(&self) -> &str {
        &self.metadata.media_type
    }

    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.metadata.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.metadata.updated
    }

    pub fn metadata(&self) -> &FragmentMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Base type without parameters, e.g. `text/html` for `text/html; charset=utf-8`
    pub fn mime_type(&self) -> &'static str {
        self.kind.media_type()
    }

    pub fn is_text(&self) -> bool {
        self.kind.is_text()
    }

    /// Media types this fragment can be represented as
    pub fn formats(&self) -> Vec<&'static str> {
        convert::allowed_targets(self.kind)
            .iter()
            .map(MediaKind::media_type)
            .collect()
    }

    /// All fragments for an owner, as ids or hydrated fragments
    pub async fn by_owner(stores: &Stores, owner_id: &str, expand: bool) -> Result<Listing> {
        let records = stores.metadata.query_by_owner(owner_id).await?;
        debug!(owner_id, count = records.len(), expand, "Listed fragments");

        if !expand {
            return Ok(Listing::Ids(records.into_iter().map(|m| m.id).collect()));
        }
        records
            .into_iter()
            .map(|metadata| Self::from_metadata(stores, metadata))
            .collect::<Result<Vec<_>>>()
            .map(Listing::Fragments)
    }

    /// Look up one fragment; `Ok(None)` when no metadata exists
    pub async fn by_id(stores: &Stores, owner_id: &str, id: &str) -> Result<Option<Self>> {
        stores
            .metadata
            .get(owner_id, id)
            .await?
            .map(|metadata| Self::from_metadata(stores, metadata))
            .transpose()
    }

    /// Advance `updated` and write the metadata record. The payload is untouched.
    pub async fn save(&mut self) -> Result<()> {
        let mut metadata = self.metadata.clone();
        metadata.updated = next_after(metadata.updated);

        self.stores
            .metadata
            .put(&metadata.owner_id, &metadata.id, &metadata)
            .await?;
        self.metadata = metadata;
        debug!(owner_id = %self.owner_id(), fragment_id = %self.id(), "Saved fragment metadata");
        Ok(())
    }

    /// Replace the payload, then write metadata advertising its size
    ///
    /// If the payload write fails nothing changes. If the metadata write
    /// fails the new payload is stored but this fragment keeps its previous
    /// size and timestamps.
    pub async fn set_data(&mut self, data: Bytes) -> Result<()> {
        let mut metadata = self.metadata.clone();
        metadata.size = data.len() as u64;
        metadata.updated = next_after(metadata.updated);

        self.stores
            .data
            .put(&metadata.owner_id, &metadata.id, data)
            .await?;
        self.stores
            .metadata
            .put(&metadata.owner_id, &metadata.id, &metadata)
            .await?;

        self.metadata = metadata;
        debug!(
            owner_id = %self.owner_id(),
            fragment_id = %self.id(),
            size = self.size(),
            "Stored fragment data"
        );
        Ok(())
    }

    /// Current payload, or `None` if none was ever written
    pub async fn get_data(&self) -> Result<Option<Bytes>> {
        self.stores.data.get(self.owner_id(), self.id()).await
    }

    /// This fragment's bytes in the `target` representation
    ///
    /// The target is checked against the conversion table before the payload
    /// is read. A missing payload converts as empty.
    pub async fn representation(&self, target: MediaKind) -> Result<Bytes> {
        convert::ensure_convertible(self.kind, target)?;
        let data = self.get_data().await?.unwrap_or_default();
        convert::convert(self.kind, data, target)
    }

    /// Remove a fragment's payload and metadata
    ///
    /// Fails with `NotFound` when no metadata exists. The payload goes first:
    /// if that fails nothing was removed (`DeletionFailed`); if the payload
    /// is gone but the metadata delete fails the result is
    /// `PartialDeletion`.
    ///
    /// Not serialized against a concurrent [`Fragment::set_data`] on the same
    /// key. Depending on interleaving the outcome is a clean delete, a
    /// resurrected fragment with the new payload, or resurrected metadata
    /// whose payload reads as empty.
    pub async fn delete(stores: &Stores, owner_id: &str, id: &str) -> Result<()> {
        if stores.metadata.get(owner_id, id).await?.is_none() {
            return Err(FragmentError::not_found(owner_id, id));
        }

        if let Err(e) = stores.data.delete(owner_id, id).await {
            error!(owner_id, fragment_id = id, error = %e, "Failed to delete fragment data");
            return Err(FragmentError::DeletionFailed {
                owner_id: owner_id.to_string(),
                id: id.to_string(),
                message: e.to_string(),
            });
        }

        if let Err(e) = stores.metadata.delete(owner_id, id).await {
            error!(
                owner_id,
                fragment_id = id,
                error = %e,
                "Fragment data deleted but metadata remains"
            );
            return Err(FragmentError::PartialDeletion {
                owner_id: owner_id.to_string(),
                id: id.to_string(),
                message: e.to_string(),
            });
        }

        info!(owner_id, fragment_id = id, "Deleted fragment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MockBlobStore, MockMetadataStore};
    use mockall::Sequence;
    use std::sync::Arc;

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

    fn mocked(metadata: MockMetadataStore, data: MockBlobStore) -> Stores {
        Stores::new(Arc::new(metadata), Arc::new(data))
    }

    #[test]
    fn test_new_generates_id_and_timestamps() {
        let stores = Stores::in_memory();
        let fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();

        assert!(Uuid::parse_str(fragment.id()).is_ok());
        assert_eq!(fragment.size(), 0);
        assert_eq!(fragment.created(), fragment.updated());
    }

    #[test]
    fn test_new_keeps_given_id() {
        let stores = Stores::in_memory();
        let fragment = Fragment::new(
            &stores,
            FragmentInit::new("owner", "text/markdown").with_id("abc").with_size(4),
        )
        .unwrap();
        assert_eq!(fragment.id(), "abc");
        assert_eq!(fragment.size(), 4);
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        let stores = Stores::in_memory();
        let cases = [
            FragmentInit::new("", "text/plain"),
            FragmentInit::new("owner", ""),
            FragmentInit::new("owner", "text/plain").with_size(-1),
            FragmentInit::new("owner", "application/msword"),
            FragmentInit::new("owner", "not a type"),
        ];
        for init in cases {
            let err = Fragment::new(&stores, init.clone()).unwrap_err();
            assert!(
                matches!(err, FragmentError::Validation(_)),
                "{init:?} should fail validation"
            );
        }
    }

    #[test]
    fn test_type_parameters_are_ignored_for_support() {
        let stores = Stores::in_memory();
        let fragment =
            Fragment::new(&stores, FragmentInit::new("owner", "text/html; charset=utf-8")).unwrap();
        assert_eq!(fragment.media_type(), "text/html; charset=utf-8");
        assert_eq!(fragment.mime_type(), "text/html");
        assert!(fragment.is_text());
        assert_eq!(fragment.formats(), vec!["text/html", "text/plain"]);
    }

    #[test]
    fn test_image_formats() {
        let stores = Stores::in_memory();
        let fragment = Fragment::new(&stores, FragmentInit::new("owner", "image/png")).unwrap();
        assert!(!fragment.is_text());
        assert_eq!(fragment.formats().len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_construction_writes_nothing() {
        let mut metadata = MockMetadataStore::new();
        metadata.expect_put().never();
        let mut data = MockBlobStore::new();
        data.expect_put().never();
        let stores = mocked(metadata, data);

        assert!(Fragment::new(&stores, FragmentInit::new("owner", "video/mp4")).is_err());
    }

    #[tokio::test]
    async fn test_save_advances_updated() {
        let stores = Stores::in_memory();
        let mut fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        let before = fragment.updated();

        fragment.save().await.unwrap();
        let first = fragment.updated();
        fragment.save().await.unwrap();

        assert!(first > before);
        assert!(fragment.updated() > first);
        let stored = Fragment::by_id(&stores, "owner", fragment.id()).await.unwrap().unwrap();
        assert_eq!(stored.updated(), fragment.updated());
    }

    #[tokio::test]
    async fn test_set_data_round_trip() {
        let stores = Stores::in_memory();
        let mut fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        fragment.save().await.unwrap();

        fragment.set_data(Bytes::from_static(b"hello world")).await.unwrap();

        assert_eq!(fragment.size(), 11);
        assert_eq!(
            fragment.get_data().await.unwrap(),
            Some(Bytes::from_static(b"hello world"))
        );
        let stored = Fragment::by_id(&stores, "owner", fragment.id()).await.unwrap().unwrap();
        assert_eq!(stored.size(), 11);
    }

    #[tokio::test]
    async fn test_set_data_writes_payload_before_metadata() {
        let mut seq = Sequence::new();
        let mut data = MockBlobStore::new();
        let mut metadata = MockMetadataStore::new();
        data.expect_put()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        metadata
            .expect_put()
            .withf(|_, _, m| m.size == 3)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        let stores = mocked(metadata, data);

        let mut fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        fragment.set_data(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(fragment.size(), 3);
    }

    #[tokio::test]
    async fn test_failed_payload_write_leaves_metadata_alone() {
        let mut data = MockBlobStore::new();
        data.expect_put()
            .returning(|_, _, _| Err(FragmentError::DataWrite("bucket gone".into())));
        let mut metadata = MockMetadataStore::new();
        metadata.expect_put().never();
        let stores = mocked(metadata, data);

        let mut fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        let err = fragment.set_data(Bytes::from_static(b"abc")).await.unwrap_err();

        assert!(matches!(err, FragmentError::DataWrite(_)));
        assert_eq!(fragment.size(), 0);
    }

    #[tokio::test]
    async fn test_by_id_absent_is_none() {
        let stores = Stores::in_memory();
        assert!(Fragment::by_id(&stores, "owner", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_without_payload_reads_as_empty() {
        let stores = Stores::in_memory();
        let mut fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        fragment.save().await.unwrap();

        assert_eq!(fragment.get_data().await.unwrap(), None);
        assert_eq!(fragment.representation(MediaKind::Plain).await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn test_by_owner_ids_and_expanded() {
        let stores = Stores::in_memory();
        for id in ["b", "a"] {
            let mut fragment = Fragment::new(
                &stores,
                FragmentInit::new("owner", "text/markdown").with_id(id),
            )
            .unwrap();
            fragment.save().await.unwrap();
        }

        match Fragment::by_owner(&stores, "owner", false).await.unwrap() {
            Listing::Ids(ids) => assert_eq!(ids, vec!["a", "b"]),
            other => panic!("expected ids, got {other:?}"),
        }
        match Fragment::by_owner(&stores, "owner", true).await.unwrap() {
            Listing::Fragments(fragments) => {
                let ids: Vec<_> = fragments.iter().map(Fragment::id).collect();
                assert_eq!(ids, vec!["a", "b"]);
                assert!(fragments.iter().all(|f| f.mime_type() == "text/markdown"));
            }
            other => panic!("expected fragments, got {other:?}"),
        }
        assert!(Fragment::by_owner(&stores, "nobody", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_representation_rejects_before_reading_payload() {
        let mut data = MockBlobStore::new();
        data.expect_get().never();
        let stores = mocked(MockMetadataStore::new(), data);

        let fragment = Fragment::new(&stores, FragmentInit::new("owner", "text/plain")).unwrap();
        let err = fragment.representation(MediaKind::Html).await.unwrap_err();
        assert!(matches!(err, FragmentError::UnsupportedConversion { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let stores = Stores::in_memory();
        let err = Fragment::delete(&stores, "owner", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_payload_then_metadata() {
        let mut seq = Sequence::new();
        let mut metadata = MockMetadataStore::new();
        let mut data = MockBlobStore::new();
        metadata
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|owner, id| Ok(Some(record(owner, id))));
        data.expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        metadata
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        Fragment::delete(&mocked(metadata, data), "owner", "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_payload_delete_failure_keeps_metadata() {
        let mut metadata = MockMetadataStore::new();
        metadata
            .expect_get()
            .returning(|owner, id| Ok(Some(record(owner, id))));
        metadata.expect_delete().never();
        let mut data = MockBlobStore::new();
        data.expect_delete()
            .returning(|_, _| Err(FragmentError::storage("access denied")));

        let err = Fragment::delete(&mocked(metadata, data), "owner", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, FragmentError::DeletionFailed { .. }));
        assert!(err.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn test_metadata_delete_failure_is_partial_deletion() {
        let mut metadata = MockMetadataStore::new();
        metadata
            .expect_get()
            .returning(|owner, id| Ok(Some(record(owner, id))));
        metadata.expect_delete().returning(|_, _| {
            Err(FragmentError::StoreUnavailable {
                operation: "delete_item",
                attempts: 5,
                message: "connection reset".into(),
            })
        });
        let mut data = MockBlobStore::new();
        data.expect_delete().returning(|_, _| Ok(()));

        let err = Fragment::delete(&mocked(metadata, data), "owner", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, FragmentError::PartialDeletion { .. }));
    }
}
