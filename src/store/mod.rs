//! Object store abstraction.
//!
//! The service talks to its bucket exclusively through [`ObjectStore`]. The
//! handle is constructed once at startup and injected into the services as an
//! `Arc<dyn ObjectStore>`; nothing in the crate keeps a global client.
//!
//! Listings are paginated by every backend. [`list_pages`] turns the page
//! protocol into a lazy stream that can be restarted from any continuation
//! token, and [`list_all`] drains it for callers that need the full set.

pub mod memory;
pub mod s3;

use crate::models::object::{ObjectRecord, StorageClass};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt, pin_mut, stream};
use std::collections::HashSet;
use thiserror::Error;

/// Largest page a ListObjectsV2-style call may return.
pub const MAX_PAGE_SIZE: i32 = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object store unreachable: {0}")]
    Unreachable(String),
    #[error("object store misconfigured: {0}")]
    Misconfigured(String),
    #[error("object store throttled the request: {0}")]
    Throttled(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object store rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
}

impl StoreError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_) | StoreError::Throttled(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Parameters of one listing, shared by every page of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: i32,
}

impl ListRequest {
    /// Flat listing of every key under `prefix`.
    pub fn recursive(prefix: impl Into<String>, max_keys: i32) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            max_keys: max_keys.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Listing grouped into folders on `/`.
    pub fn folders(prefix: impl Into<String>, max_keys: i32) -> Self {
        Self {
            delimiter: Some("/".to_string()),
            ..Self::recursive(prefix, max_keys)
        }
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    /// Token to resume after this page; `None` on the last page.
    pub next_continuation: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch a single listing page, starting at `continuation` when given.
    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> StoreResult<ListPage>;

    /// Rewrite `key` onto itself with a new storage class, keeping its
    /// content, content type and user metadata.
    async fn copy_in_place(&self, key: &str, storage_class: StorageClass) -> StoreResult<()>;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<()>;
}

enum Cursor {
    Start(Option<String>),
    Next(String),
    Done,
}

/// Lazily walk a listing page by page.
///
/// The stream ends after the page that carries no continuation token. A page
/// error ends the stream with that error; resuming is a matter of calling this
/// again with the last token that was seen.
pub fn list_pages<'a>(
    store: &'a dyn ObjectStore,
    request: ListRequest,
    start: Option<String>,
) -> impl Stream<Item = StoreResult<ListPage>> + Send + 'a {
    stream::try_unfold(Cursor::Start(start), move |cursor| {
        let request = request.clone();
        async move {
            let token = match cursor {
                Cursor::Start(token) => token,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };
            let page = store.list_page(&request, token.clone()).await?;
            let next = match &page.next_continuation {
                Some(next) if Some(next) == token.as_ref() => {
                    return Err(StoreError::Rejected {
                        code: "InvalidContinuation".into(),
                        message: "listing returned the token it was given".into(),
                    });
                }
                Some(next) => Cursor::Next(next.clone()),
                None => Cursor::Done,
            };
            Ok(Some((page, next)))
        }
    })
}

/// Drain every page of a listing into one.
pub async fn list_all(store: &dyn ObjectStore, request: ListRequest) -> StoreResult<ListPage> {
    let pages = list_pages(store, request, None);
    pin_mut!(pages);

    let mut merged = ListPage::default();
    let mut seen_prefixes = HashSet::new();
    while let Some(page) = pages.try_next().await? {
        merged.objects.extend(page.objects);
        for prefix in page.common_prefixes {
            if seen_prefixes.insert(prefix.clone()) {
                merged.common_prefixes.push(prefix);
            }
        }
    }
    Ok(merged)
}
