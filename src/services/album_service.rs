//! AlbumService — listing, upload and storage-class changes for the photo
//! album, expressed against an injected [`ObjectStore`].

use crate::{
    models::{
        album::{AlbumListing, UploadedPhoto},
        migration::{ChangeStorageClassBody, MigrationRequest, MigrationSummary},
    },
    services::migration::{MigrationError, MigrationSettings, Migrator},
    store::{ListRequest, ObjectStore, StoreError, list_all},
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("object store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

pub type AlbumResult<T> = Result<T, AlbumError>;

#[derive(Debug, Clone)]
pub struct AlbumSettings {
    /// Logical root every album lives under, e.g. `photos/`.
    pub root_prefix: String,
    /// Public URL prefix images are rendered from.
    pub public_base_url: String,
    pub page_size: i32,
    pub migration: MigrationSettings,
}

impl Default for AlbumSettings {
    fn default() -> Self {
        Self {
            root_prefix: "photos/".into(),
            public_base_url: String::new(),
            page_size: 1000,
            migration: MigrationSettings::default(),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AlbumService {
    pub store: Arc<dyn ObjectStore>,
    pub settings: Arc<AlbumSettings>,
    migrator: Migrator,
    shutdown: CancellationToken,
}

impl AlbumService {
    /// `shutdown` is cancelled when the process stops; running migrations
    /// then stop issuing copies.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        settings: AlbumSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let migrator = Migrator::new(store.clone(), settings.migration.clone());
        Self {
            store,
            settings: Arc::new(settings),
            migrator,
            shutdown,
        }
    }

    /// Resolve an optional album folder to a prefix under the root.
    ///
    /// `None`/empty is the root itself; a missing trailing `/` is added.
    fn folder_prefix(&self, folder: Option<&str>) -> AlbumResult<String> {
        let root = &self.settings.root_prefix;
        let folder = match folder.map(str::trim) {
            None | Some("") => return Ok(root.clone()),
            Some(folder) => folder,
        };

        let mut prefix = folder.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        if !prefix.starts_with(root.as_str()) || prefix.split('/').any(|s| s == "..") {
            return Err(AlbumError::InvalidArgument(format!(
                "folder `{folder}` is not inside `{root}`"
            )));
        }
        Ok(prefix)
    }

    /// Folders and files directly under `folder` (default: the root), all pages.
    pub async fn list_album(&self, folder: Option<&str>) -> AlbumResult<AlbumListing> {
        let prefix = self.folder_prefix(folder)?;
        let listing = list_all(
            self.store.as_ref(),
            ListRequest::folders(prefix, self.settings.page_size),
        )
        .await?;

        let files = listing
            .objects
            .into_iter()
            .map(|object| object.key)
            .filter(|key| !key.ends_with('/'))
            .collect();

        Ok(AlbumListing {
            folders: listing.common_prefixes,
            files,
            base_url: self.settings.public_base_url.clone(),
        })
    }

    /// Store one photo as `<folder or root><file name>`.
    pub async fn upload_photo(
        &self,
        folder: Option<&str>,
        filename: Option<&str>,
        content_type: Option<String>,
        body: Bytes,
    ) -> AlbumResult<UploadedPhoto> {
        if body.is_empty() {
            return Err(AlbumError::InvalidArgument("no file uploaded".into()));
        }
        let name = filename
            .and_then(sanitize_filename)
            .ok_or_else(|| AlbumError::InvalidArgument("file name is missing or invalid".into()))?;
        let key = format!("{}{}", self.folder_prefix(folder)?, name);

        let content_type = content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| mime_guess::from_path(name).first().map(|m| m.to_string()));

        let size = body.len();
        self.store.put_object(&key, body, content_type).await?;
        info!(%key, size, "uploaded photo");

        Ok(UploadedPhoto { key })
    }

    /// Validate the raw request and migrate every object under the prefix.
    ///
    /// Invalid input is rejected before the store is contacted.
    pub async fn change_storage_class(
        &self,
        body: ChangeStorageClassBody,
    ) -> Result<MigrationSummary, MigrationError> {
        let request = MigrationRequest::try_from(body)?;
        self.migrator
            .migrate(request, self.shutdown.child_token())
            .await
    }

    /// One-key listing of the root, used by readiness checks.
    pub async fn check_store(&self) -> Result<(), StoreError> {
        self.store
            .list_page(&ListRequest::recursive(self.settings.root_prefix.clone(), 1), None)
            .await
            .map(|_| ())
    }
}

/// Last path component of a client supplied file name, or `None` when nothing
/// usable is left.
fn sanitize_filename(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::object::StorageClass,
        services::migration::MigrationError,
        store::{ListPage, StoreResult, memory::MemoryStore},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every call that reaches the store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn list_page(
            &self,
            request: &ListRequest,
            continuation: Option<String>,
        ) -> StoreResult<ListPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_page(request, continuation).await
        }

        async fn copy_in_place(&self, key: &str, class: StorageClass) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.copy_in_place(key, class).await
        }

        async fn put_object(
            &self,
            key: &str,
            body: Bytes,
            content_type: Option<String>,
        ) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.put_object(key, body, content_type).await
        }
    }

    fn service(store: Arc<MemoryStore>) -> AlbumService {
        AlbumService::new(
            store,
            AlbumSettings {
                public_base_url: "https://album.s3.amazonaws.com".into(),
                ..AlbumSettings::default()
            },
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn list_album_splits_folders_and_files() {
        let store = Arc::new(MemoryStore::new());
        for key in [
            "photos/",
            "photos/cover.jpg",
            "photos/italy/1.jpg",
            "photos/japan/1.jpg",
            "elsewhere/x.jpg",
        ] {
            store.seed(key, "STANDARD").await;
        }

        let listing = service(store).list_album(None).await.unwrap();
        assert_eq!(listing.folders, ["photos/italy/", "photos/japan/"]);
        assert_eq!(listing.files, ["photos/cover.jpg"]);
        assert_eq!(listing.base_url, "https://album.s3.amazonaws.com");
    }

    #[tokio::test]
    async fn list_album_reads_every_page() {
        let store = Arc::new(MemoryStore::new().with_max_page_size(100));
        for i in 0..250 {
            store.seed(&format!("photos/{i:03}.jpg"), "STANDARD").await;
        }
        let listing = service(store).list_album(None).await.unwrap();
        assert_eq!(listing.files.len(), 250);
    }

    #[tokio::test]
    async fn list_album_of_a_sub_folder() {
        let store = Arc::new(MemoryStore::new());
        store.seed("photos/italy/rome/1.jpg", "STANDARD").await;
        store.seed("photos/italy/2.jpg", "STANDARD").await;

        let listing = service(store).list_album(Some("photos/italy")).await.unwrap();
        assert_eq!(listing.folders, ["photos/italy/rome/"]);
        assert_eq!(listing.files, ["photos/italy/2.jpg"]);
    }

    #[tokio::test]
    async fn folders_outside_the_root_are_rejected() {
        let svc = service(Arc::new(MemoryStore::new()));
        for folder in ["videos/", "photos/../secrets/"] {
            let err = svc.list_album(Some(folder)).await.unwrap_err();
            assert!(matches!(err, AlbumError::InvalidArgument(_)), "{folder}");
        }
    }

    #[tokio::test]
    async fn upload_derives_key_and_content_type() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());

        let uploaded = svc
            .upload_photo(
                Some("photos/italy/"),
                Some("C:\\Users\\me\\beach.png"),
                None,
                Bytes::from_static(b"\x89PNG"),
            )
            .await
            .unwrap();

        assert_eq!(uploaded.key, "photos/italy/beach.png");
        let stored = store.get("photos/italy/beach.png").await.unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn upload_without_payload_or_name_is_invalid() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone());

        let empty = svc
            .upload_photo(None, Some("a.jpg"), None, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(empty, AlbumError::InvalidArgument(_)));

        let nameless = svc
            .upload_photo(None, Some("dir/"), None, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(nameless, AlbumError::InvalidArgument(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn invalid_migration_requests_never_reach_the_store() {
        let store = Arc::new(CountingStore::default());
        store.inner.seed("photos/a/1.jpg", "STANDARD").await;
        let svc = AlbumService::new(store.clone(), AlbumSettings::default(), CancellationToken::new());

        for (prefix, class) in [
            (None, Some("GLACIER")),
            (Some("photos/a/"), None),
            (Some("photos/a/"), Some("FROZEN")),
        ] {
            let body = ChangeStorageClassBody {
                folder_prefix: prefix.map(str::to_string),
                storage_class: class.map(str::to_string),
            };
            let err = svc.change_storage_class(body).await.unwrap_err();
            assert!(matches!(err, MigrationError::InvalidArgument(_)));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        let body = ChangeStorageClassBody {
            folder_prefix: Some("photos/a/".into()),
            storage_class: Some("GLACIER".into()),
        };
        let summary = svc.change_storage_class(body).await.unwrap();
        assert_eq!(summary.succeeded, ["photos/a/1.jpg"]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_stops_new_copies() {
        let store = Arc::new(MemoryStore::new());
        store.seed("photos/a/1.jpg", "STANDARD").await;
        let shutdown = CancellationToken::new();
        let svc = AlbumService::new(store.clone(), AlbumSettings::default(), shutdown.clone());
        shutdown.cancel();

        let body = ChangeStorageClassBody {
            folder_prefix: Some("photos/a/".into()),
            storage_class: Some("GLACIER".into()),
        };
        let summary = svc.change_storage_class(body).await.unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(store.get("photos/a/1.jpg").await.unwrap().storage_class, "STANDARD");
    }

    #[test]
    fn sanitize_keeps_only_the_last_component() {
        assert_eq!(sanitize_filename("a/b/c.jpg"), Some("c.jpg"));
        assert_eq!(sanitize_filename(" ..\\evil.jpg "), Some("evil.jpg"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("bad\nname"), None);
    }
}
