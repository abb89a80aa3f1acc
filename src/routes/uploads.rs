use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::blobs::tickets;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Raster formats accepted for upload.
const ACCEPTED_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// The media type without parameters, if it is one we accept.
fn accepted_type(header: Option<&str>) -> Option<&'static str> {
    let essence = header?.split(';').next()?.trim().to_ascii_lowercase();
    ACCEPTED_TYPES.iter().copied().find(|t| *t == essence)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub storage_id: String,
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/uploads/{token}",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/blobs/{id}", get(download))
}

/// Store the request body under a ticket from `generateUploadUrl`.
async fn upload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<UploadResponse>> {
    let content_type = accepted_type(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )
    .ok_or_else(|| {
        AppError::BadRequest("Only PNG, JPEG, GIF and WebP images are accepted".into())
    })?;
    if body.is_empty() {
        return Err(AppError::BadRequest("Upload body is empty".into()));
    }

    let owner_id = {
        let conn = state.db.get()?;
        tickets::redeem_ticket(&conn, &token)?
    };

    let storage_id = state.blobs.put(&owner_id, content_type, body).await?;
    tracing::info!(storage_id = %storage_id, owner_id = %owner_id, "Upload stored");

    Ok(Json(UploadResponse { storage_id }))
}

async fn download(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let object = state
        .blobs
        .open(&id)
        .await?
        .ok_or(AppError::NotFound("Blob"))?;

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        object.bytes,
    )
        .into_response())
}
