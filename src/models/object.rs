//! Represents an object (file) stored in the bucket and its storage tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// A single object as reported by a listing call.
///
/// The record mirrors what the store returns; the object body is never held here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Storage class exactly as the store names it (e.g. `STANDARD`, `GLACIER`).
    ///
    /// Kept as a string because the store may report tiers this service cannot
    /// request (outposts, express one-zone, ...).
    pub storage_class: String,

    /// Size in bytes.
    pub size: i64,

    /// Timestamp when the object was last written.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectRecord {
    /// Whether the object already sits in `class`.
    pub fn is_in(&self, class: StorageClass) -> bool {
        self.storage_class == class.as_str()
    }
}

/// Storage tiers a migration may target.
///
/// Parsed at the HTTP boundary so that a typo is rejected before any listing
/// or copy call reaches the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "STANDARD_IA")]
    StandardInfrequentAccess,
    #[serde(rename = "ONEZONE_IA")]
    OneZoneInfrequentAccess,
    #[serde(rename = "INTELLIGENT_TIERING")]
    IntelligentTiering,
    #[serde(rename = "GLACIER_IR")]
    GlacierInstantRetrieval,
    #[serde(rename = "GLACIER")]
    Glacier,
    #[serde(rename = "DEEP_ARCHIVE")]
    DeepArchive,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized storage class `{0}`")]
pub struct UnknownStorageClass(pub String);

impl StorageClass {
    pub const ALL: [StorageClass; 7] = [
        StorageClass::Standard,
        StorageClass::StandardInfrequentAccess,
        StorageClass::OneZoneInfrequentAccess,
        StorageClass::IntelligentTiering,
        StorageClass::GlacierInstantRetrieval,
        StorageClass::Glacier,
        StorageClass::DeepArchive,
    ];

    /// Wire name understood by S3-compatible stores.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::StandardInfrequentAccess => "STANDARD_IA",
            StorageClass::OneZoneInfrequentAccess => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::GlacierInstantRetrieval => "GLACIER_IR",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = UnknownStorageClass;

    /// Accepts the S3 wire names plus the long spellings of the infrequent
    /// access tiers. Matching is exact; `standard` is not `STANDARD`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let class = match value.trim() {
            "STANDARD" => StorageClass::Standard,
            "STANDARD_IA" | "STANDARD_INFREQUENT_ACCESS" => StorageClass::StandardInfrequentAccess,
            "ONEZONE_IA" | "ONE_ZONE_INFREQUENT_ACCESS" => StorageClass::OneZoneInfrequentAccess,
            "INTELLIGENT_TIERING" => StorageClass::IntelligentTiering,
            "GLACIER_IR" => StorageClass::GlacierInstantRetrieval,
            "GLACIER" => StorageClass::Glacier,
            "DEEP_ARCHIVE" => StorageClass::DeepArchive,
            other => return Err(UnknownStorageClass(other.to_string())),
        };
        Ok(class)
    }
}
