//! File and folder handlers.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use serde::Deserialize;

use crate::file::folder::Folder;
use crate::file::metadata::FileRecord;
use crate::file::service::FolderListing;
use crate::web::error::ApiError;
use crate::web::handlers::{require_session, AppState, ClientIp, MaybeBearer};

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<i64>,
}

/// POST /api/files - multipart upload.
///
/// Fields: `file` (required, with filename), `folder_id` (optional),
/// `is_public` (optional, "true"/"false").
pub async fn upload(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    mut multipart: Multipart,
) -> Result<Json<FileRecord>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder_id: Option<i64> = None;
    let mut is_public = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| ApiError::bad_request("file field needs a filename"))?
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("folder_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("bad folder_id: {e}")))?;
                folder_id = Some(
                    text.parse()
                        .map_err(|_| ApiError::bad_request("folder_id must be an integer"))?,
                );
            }
            Some("is_public") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("bad is_public: {e}")))?;
                is_public = text == "true" || text == "1";
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::bad_request("missing file field"))?;

    let record = state
        .files
        .upload(
            session.user_id,
            folder_id,
            &filename,
            &bytes,
            is_public,
            ip.as_deref(),
        )
        .await?;
    Ok(Json(record))
}

/// GET /api/files/{id} - download the file bytes.
pub async fn download(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    Path(file_id): Path<i64>,
) -> Result<(HeaderMap, Vec<u8>), ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    let (record, bytes) = state.files.download(session.user_id, file_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.mime_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        record.original_name.replace('"', "")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((headers, bytes))
}

/// GET /api/folders - list the root level.
pub async fn list_root(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
) -> Result<Json<FolderListing>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    let listing = state.files.list_folder(session.user_id, None).await?;
    Ok(Json(listing))
}

/// GET /api/folders/{id} - list one folder.
pub async fn list_folder(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    Path(folder_id): Path<i64>,
) -> Result<Json<FolderListing>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    let listing = state
        .files
        .list_folder(session.user_id, Some(folder_id))
        .await?;
    Ok(Json(listing))
}

/// POST /api/folders - create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    bearer: MaybeBearer,
    ClientIp(ip): ClientIp,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<Folder>, ApiError> {
    let session = require_session(&state, &bearer, ip.as_deref()).await?;
    let folder = state
        .files
        .create_folder(session.user_id, &req.name, req.parent_id, ip.as_deref())
        .await?;
    Ok(Json(folder))
}
