//! In-process object store.
//!
//! Mirrors the S3 behaviors the service depends on: lexicographic listings
//! with prefix/delimiter grouping, bounded pages with opaque continuation
//! tokens, and copy-in-place rules (a self-copy must change the storage class,
//! archived objects cannot be copied without a restore). Used for local runs
//! with `--backend memory` and by the test suite.

use super::{ListPage, ListRequest, MAX_PAGE_SIZE, ObjectStore, StoreError, StoreResult};
use crate::models::object::{ObjectRecord, StorageClass};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// An object held by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub storage_class: String,
    pub metadata: HashMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    pub fn new(body: impl Into<Bytes>, storage_class: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
            storage_class: storage_class.into(),
            metadata: HashMap::new(),
            last_modified: Utc::now(),
        }
    }
}

pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    max_page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            max_page_size: MAX_PAGE_SIZE as usize,
        }
    }

    /// Cap pages below what callers ask for, to exercise pagination.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size.max(1);
        self
    }

    pub async fn insert(&self, key: impl Into<String>, object: StoredObject) {
        self.objects.write().await.insert(key.into(), object);
    }

    /// Insert a small placeholder body under `key` in `storage_class`.
    pub async fn seed(&self, key: &str, storage_class: &str) {
        self.insert(key, StoredObject::new(key.as_bytes().to_vec(), storage_class))
            .await;
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

/// Where a continuation token resumes.
#[derive(Debug, PartialEq, Eq)]
enum Resume {
    AfterKey(String),
    AfterPrefix(String),
}

impl Resume {
    fn admits(&self, key: &str) -> bool {
        match self {
            Resume::AfterKey(last) => key > last.as_str(),
            Resume::AfterPrefix(prefix) => key > prefix.as_str() && !key.starts_with(prefix),
        }
    }

    fn encode(&self) -> String {
        let raw = match self {
            Resume::AfterKey(key) => format!("k:{key}"),
            Resume::AfterPrefix(prefix) => format!("p:{prefix}"),
        };
        general_purpose::STANDARD.encode(raw)
    }

    fn decode(token: &str) -> StoreResult<Self> {
        let invalid = || StoreError::Rejected {
            code: "InvalidArgument".into(),
            message: "The continuation token provided is incorrect".into(),
        };
        let raw = general_purpose::STANDARD
            .decode(token)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(invalid)?;
        match raw.split_once(':') {
            Some(("k", key)) => Ok(Resume::AfterKey(key.to_string())),
            Some(("p", prefix)) => Ok(Resume::AfterPrefix(prefix.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// Common prefix `key` is grouped under, if any.
///
/// Keys that contain `delimiter` after `prefix` collapse into
/// `prefix + <segment> + delimiter`.
fn common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    let pos = rest.find(delimiter)?;
    Some(format!("{}{}", prefix, &rest[..pos + delimiter.len()]))
}

fn archived(storage_class: &str) -> bool {
    matches!(storage_class, "GLACIER" | "DEEP_ARCHIVE")
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> StoreResult<ListPage> {
        let resume = continuation.as_deref().map(Resume::decode).transpose()?;
        let limit = (request.max_keys.max(1) as usize).min(self.max_page_size);
        let objects = self.objects.read().await;

        let mut page = ListPage::default();
        let mut emitted = 0;
        let mut last = None;
        let mut truncated = false;

        let candidates = objects
            .range(request.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&request.prefix));
        for (key, object) in candidates {
            if resume.as_ref().is_some_and(|r| !r.admits(key)) {
                continue;
            }
            let grouped = request
                .delimiter
                .as_deref()
                .and_then(|delimiter| common_prefix(key, &request.prefix, delimiter));
            if grouped.is_some() && grouped.as_ref() == page.common_prefixes.last() {
                continue;
            }
            if emitted == limit {
                truncated = true;
                break;
            }
            match grouped {
                Some(prefix) => {
                    last = Some(Resume::AfterPrefix(prefix.clone()));
                    page.common_prefixes.push(prefix);
                }
                None => {
                    last = Some(Resume::AfterKey(key.clone()));
                    page.objects.push(ObjectRecord {
                        key: key.clone(),
                        storage_class: object.storage_class.clone(),
                        size: object.body.len() as i64,
                        last_modified: Some(object.last_modified),
                    });
                }
            }
            emitted += 1;
        }

        if truncated {
            page.next_continuation = last.map(|resume| resume.encode());
        }
        Ok(page)
    }

    async fn copy_in_place(&self, key: &str, storage_class: StorageClass) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if archived(&object.storage_class) {
            return Err(StoreError::Rejected {
                code: "InvalidObjectState".into(),
                message: format!(
                    "Object {key} is in {} and must be restored before it can be copied",
                    object.storage_class
                ),
            });
        }
        if object.storage_class == storage_class.as_str() {
            return Err(StoreError::Rejected {
                code: "InvalidRequest".into(),
                message: "This copy request is illegal because it is trying to copy an object \
                          to itself without changing the object's metadata, storage class, \
                          website redirect location or encryption attributes."
                    .into(),
            });
        }

        object.storage_class = storage_class.as_str().to_string();
        object.last_modified = Utc::now();
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<()> {
        let object = StoredObject {
            content_type,
            ..StoredObject::new(body, StorageClass::Standard.as_str())
        };
        self.insert(key, object).await;
        Ok(())
    }
}
