//! HTTP handlers for the photo album.
//! Request parsing lives here; everything else is delegated to `AlbumService`.

use crate::{
    errors::AppError,
    models::{
        album::{AlbumListing, UploadedPhoto},
        migration::{ChangeStorageClassBody, ChangeStorageClassResponse},
    },
    services::album_service::AlbumService,
};
use axum::{
    Json,
    extract::{Multipart, Query, State, rejection::JsonRejection},
    response::Html,
};
use bytes::Bytes;
use serde::Deserialize;

/// Query params accepted by `GET /list`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub folder: Option<String>,
}

/// `GET /` — the album page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// `GET /list` — folders and files under the album root (or `?folder=`).
pub async fn list_photos(
    State(service): State<AlbumService>,
    Query(q): Query<ListQuery>,
) -> Result<Json<AlbumListing>, AppError> {
    let listing = service.list_album(q.folder.as_deref()).await?;
    Ok(Json(listing))
}

/// `POST /upload` — multipart form with a `file` field and an optional
/// `folder` field.
pub async fn upload_photo(
    State(service): State<AlbumService>,
    mut multipart: Multipart,
) -> Result<Json<UploadedPhoto>, AppError> {
    let mut folder: Option<String> = None;
    let mut file: Option<(Option<String>, Option<String>, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
                file = Some((filename, content_type, data));
            }
            Some("folder") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(err.body_text()))?;
                folder = Some(text);
            }
            _ => {}
        }
    }

    let Some((filename, content_type, data)) = file else {
        return Err(AppError::bad_request("no file uploaded"));
    };

    let uploaded = service
        .upload_photo(folder.as_deref(), filename.as_deref(), content_type, data)
        .await?;
    Ok(Json(uploaded))
}

/// `POST /changeStorageClass` — body `{ folderPrefix, storageClass }`.
///
/// Answers 200 even when some keys failed; the summary lists them.
pub async fn change_storage_class(
    State(service): State<AlbumService>,
    payload: Result<Json<ChangeStorageClassBody>, JsonRejection>,
) -> Result<Json<ChangeStorageClassResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let summary = service.change_storage_class(body).await?;
    Ok(Json(summary.into()))
}
