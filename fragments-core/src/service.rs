/*!
Caller-facing operations over a [`Stores`] pair.

Every operation surfaces only [`FragmentError`]; absence is always
`NotFound`, never a backend error.
*/

use crate::fragment::{Fragment, FragmentInit, Listing};
use crate::media::MediaKind;
use crate::metadata::FragmentMetadata;
use crate::storage::Stores;
use crate::{FragmentError, Result};
use bytes::Bytes;
use tracing::{info, warn};

/// Result of [`FragmentService::list_by_owner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentList {
    Ids(Vec<String>),
    Metadata(Vec<FragmentMetadata>),
}

/// A converted (or native) representation of a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub kind: MediaKind,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct FragmentService {
    stores: Stores,
}

impl FragmentService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Construct, save and store the payload, in that order
    pub async fn create(&self, owner_id: &str, media_type: &str, data: Bytes) -> Result<Fragment> {
        let mut fragment = Fragment::new(&self.stores, FragmentInit::new(owner_id, media_type))?;
        fragment.save().await?;
        fragment.set_data(data).await?;

        info!(
            owner_id,
            fragment_id = %fragment.id(),
            media_type,
            size = fragment.size(),
            "Created fragment"
        );
        Ok(fragment)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Fragment> {
        Fragment::by_id(&self.stores, owner_id, id)
            .await?
            .ok_or_else(|| FragmentError::not_found(owner_id, id))
    }

    /// Metadata record only
    pub async fn get_info(&self, owner_id: &str, id: &str) -> Result<FragmentMetadata> {
        self.get(owner_id, id).await.map(|f| f.metadata().clone())
    }

    pub async fn list_by_owner(&self, owner_id: &str, expand: bool) -> Result<FragmentList> {
        Ok(match Fragment::by_owner(&self.stores, owner_id, expand).await? {
            Listing::Ids(ids) => FragmentList::Ids(ids),
            Listing::Fragments(fragments) => FragmentList::Metadata(
                fragments.iter().map(|f| f.metadata().clone()).collect(),
            ),
        })
    }

    /// Replace a fragment's payload; the declared type must match the stored one
    ///
    /// Types are compared by kind, so a differing charset parameter or a
    /// YAML alias is not a mismatch.
    pub async fn replace_data(
        &self,
        owner_id: &str,
        id: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<Fragment> {
        let mut fragment = self.get(owner_id, id).await?;

        if MediaKind::parse(media_type) != Some(fragment.kind()) {
            warn!(
                owner_id,
                fragment_id = id,
                expected = %fragment.media_type(),
                actual = media_type,
                "Rejected replacement with a different type"
            );
            return Err(FragmentError::TypeMismatch {
                expected: fragment.media_type().to_string(),
                actual: media_type.to_string(),
            });
        }

        fragment.set_data(data).await?;
        info!(owner_id, fragment_id = id, size = fragment.size(), "Replaced fragment data");
        Ok(fragment)
    }

    /// Fragment bytes in `target_type`
    pub async fn get_representation(
        &self,
        owner_id: &str,
        id: &str,
        target_type: &str,
    ) -> Result<Bytes> {
        let fragment = self.get(owner_id, id).await?;
        let target = MediaKind::parse(target_type).ok_or_else(|| {
            FragmentError::unsupported_conversion(fragment.mime_type(), target_type)
        })?;
        fragment.representation(target).await
    }

    /// Read addressed as `id` or `id.ext`
    ///
    /// Without an extension the native representation is returned. An
    /// extension that maps to no supported kind is `UnsupportedConversion`.
    pub async fn get_by_path(&self, owner_id: &str, path: &str) -> Result<Representation> {
        let (id, ext) = match path.rsplit_once('.') {
            Some((id, ext)) if !id.is_empty() => (id, Some(ext)),
            _ => (path, None),
        };
        let fragment = self.get(owner_id, id).await?;

        let kind = match ext {
            None => fragment.kind(),
            Some(ext) => MediaKind::from_extension(ext).ok_or_else(|| {
                FragmentError::unsupported_conversion(fragment.mime_type(), format!(".{ext}"))
            })?,
        };
        let data = fragment.representation(kind).await?;
        Ok(Representation { kind, data })
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        Fragment::delete(&self.stores, owner_id, id).await
    }
}
