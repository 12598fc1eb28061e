//! Error taxonomy for the storage and journal layers.
//!
//! Every failure is local to the request that hit it. The only lasting
//! damage any of these can leave behind is an orphaned remote block from
//! a write that failed partway — the journal commits atomically, so
//! metadata never references a half-written file.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Missing file id, unknown route parameter, or no matching row.
    #[error("not found")]
    NotFound,

    /// The client went away mid-upload. Blocks already sent to the
    /// backend stay there (append-only contract, no reclamation).
    #[error("upload aborted: {0}")]
    UploadAborted(String),

    /// Transport or status failure talking to a blob endpoint. Fatal to
    /// the calling operation, never retried.
    #[error("backend endpoint failure: {0}")]
    Backend(String),

    /// Malformed block metadata (e.g. an unparseable stored nonce).
    #[error("block decryption failed: {0}")]
    Decrypt(String),

    #[error("metadata journal failure: {0}")]
    Journal(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        match self {
            StorageError::NotFound => StatusCode::NOT_FOUND.into_response(),
            other => {
                tracing::error!("request failed: {}", other);
                // Internal failures return an empty 500 body.
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
