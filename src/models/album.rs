//! Listing payload returned to the browser.

use serde::Serialize;

/// Folders (common prefixes) and files (object keys) found under one folder.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlbumListing {
    pub folders: Vec<String>,
    pub files: Vec<String>,
    /// Public URL prefix images are served from, e.g. `https://my-bucket.s3.amazonaws.com`.
    pub base_url: String,
}

/// Result of a successful upload.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadedPhoto {
    pub key: String,
}
