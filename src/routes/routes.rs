//! Defines routes for the photo album.
//!
//! ## Structure
//! - **Page**
//!   - `GET  /` — embedded album UI
//!
//! - **Album API** (also mounted under `/api/s3`)
//!   - `GET  /list` — folders and files under the album root (`?folder=` for a sub-folder)
//!   - `POST /upload` — multipart upload of one photo
//!   - `POST /changeStorageClass` — move every object under a prefix to another storage class
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`

use crate::{
    handlers::{
        album_handlers::{change_storage_class, index, list_photos, upload_photo},
        health_handlers::{healthz, readyz},
    },
    services::album_service::AlbumService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Album API routes, mountable at any path.
fn api() -> Router<AlbumService> {
    Router::new()
        .route("/list", get(list_photos))
        .route("/upload", post(upload_photo))
        .route("/changeStorageClass", post(change_storage_class))
}

/// Build and return the router for the whole service.
///
/// The router carries shared state (`AlbumService`) to all handlers.
/// `max_upload_bytes` bounds request bodies (multipart uploads included).
pub fn routes(max_upload_bytes: usize) -> Router<AlbumService> {
    Router::new()
        .route("/", get(index))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(api())
        .nest("/api/s3", api())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
