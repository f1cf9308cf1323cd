/*!
Fragment metadata record and its persisted shape.
*/

use crate::media::MediaKind;
use crate::{FragmentError, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor record for a fragment, excluding payload bytes.
///
/// Serializes as
/// `{"id", "ownerId", "type", "size", "created", "updated"}` with timestamps
/// in fixed-width RFC 3339 (millisecond precision, `Z` suffix) so that their
/// string form sorts chronologically.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMetadata {
    pub id: String,
    pub owner_id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: u64,
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated: DateTime<Utc>,
}

impl FragmentMetadata {
    /// Check the invariants every persisted record must hold
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(FragmentError::validation("id cannot be empty"));
        }
        if self.owner_id.is_empty() {
            return Err(FragmentError::validation("ownerId is required"));
        }
        if self.media_type.is_empty() {
            return Err(FragmentError::validation("type is required"));
        }
        self.kind()?;
        Ok(())
    }

    /// Supported kind of the stored media type
    pub fn kind(&self) -> Result<MediaKind> {
        MediaKind::parse(&self.media_type).ok_or_else(|| {
            FragmentError::validation(format!("Unsupported type: {}", self.media_type))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Current time at the precision timestamps are persisted with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A timestamp strictly later than `previous`
///
/// Falls forward by one millisecond when the clock has not advanced past
/// `previous` at persisted precision.
pub fn next_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let current = now();
    if current > previous {
        current
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Fixed-width RFC 3339 rendering of a timestamp
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// Include tests module
#[cfg(test)]
#[path = "metadata_tests.rs"]
mod metadata_tests;
