//! Gateway surface: upload, download, health.
//!
//! POST /upload/{name} — body is the raw byte stream; returns file id + secret
//! GET /download/{id}/{secret} — optional Range header; streams plaintext
//! GET /health — liveness probe
//!
//! Access is a bearer capability: (file id, secret) is necessary and
//! sufficient to read a file. A wrong secret is indistinguishable from a
//! right one here — the cipher has no integrity check and simply
//! produces wrong bytes.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::StorageError;
use crate::journal;
use crate::state::AppState;
use crate::storage::range::parse_range_header;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub secret: String,
    pub size: u64,
}

/// Build the full axum Router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/upload/{name}", post(upload))
        .route("/download/{id}/{secret}", get(download))
        .route("/health", get(health_check))
        .with_state(state)
}

/// POST /upload/{name}
///
/// Streams the request body through the storage engine, then journals
/// the resulting block list in one transaction. The secret in the
/// response is shown exactly once and never persisted; losing it makes
/// the file unrecoverable.
async fn upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Body,
) -> Result<Json<UploadResponse>, StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::NotFound);
    }

    let outcome = state.engine.write(body.into_data_stream()).await?;
    let size = outcome.total_size();
    let block_count = outcome.blocks.len();

    let db = state.db.clone();
    let blocks = outcome.blocks;
    let file_name = name.clone();
    let meta =
        tokio::task::spawn_blocking(move || journal::create_file(&db, &file_name, &blocks))
            .await??;

    tracing::info!(
        "stored file {} ({} blocks, {} bytes) as {}",
        name,
        block_count,
        size,
        meta.id
    );

    Ok(Json(UploadResponse {
        id: meta.id,
        secret: outcome.secret,
        size,
    }))
}

/// GET /download/{id}/{secret}
///
/// Optional `Range` header. A valid range gets 206 with Content-Range;
/// anything missing, malformed, or unsatisfiable falls back to the full
/// content. Bytes stream as blocks are fetched and decrypted, so a
/// failure mid-transfer truncates the response; flushed bytes cannot
/// be retracted.
async fn download(
    State(state): State<AppState>,
    Path((id, secret)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StorageError> {
    let db = state.db.clone();
    let lookup_id = id.clone();
    let meta = tokio::task::spawn_blocking(move || journal::get_file(&db, &lookup_id))
        .await??
        .ok_or(StorageError::NotFound)?;

    let total = meta.total_size();
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| parse_range_header(total, h, state.range_window));

    // Best-effort access-time touch; never fails the download.
    let db = state.db.clone();
    let touch_id = id.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = journal::touch_last_access(&db, &touch_id) {
            tracing::warn!("failed to touch last_access for {}: {}", touch_id, e);
        }
    });

    let descriptors = meta.descriptors();
    let engine = state.engine.clone();
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(2);
    tokio::spawn(async move {
        if let Err(e) = engine.read(&descriptors, &secret, range, &tx).await {
            tracing::error!("download of {} failed mid-stream: {}", id, e);
            let _ = tx.send(Err(std::io::Error::other(e.to_string()))).await;
        }
    });
    let body = Body::from_stream(ReceiverStream::new(rx));

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename={}", meta.name))
    {
        response_headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    let status = match range {
        Some((start, end)) => {
            response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(end - start + 1));
            response_headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, total))
                    .expect("numeric content-range is a valid header value"),
            );
            StatusCode::PARTIAL_CONTENT
        }
        None => {
            response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(total));
            StatusCode::OK
        }
    };

    Ok((status, response_headers, body))
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
