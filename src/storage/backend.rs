//! Remote blob endpoint pool with round-robin rotation.
//!
//! Endpoints are configured once at startup and never change. Selection
//! is a single process-wide atomic cursor: concurrent writes interleave
//! across the same endpoint sequence rather than each keeping their own.
//!
//! Upload protocol: one single-part multipart form (`file` field,
//! filename = block name) per call; the endpoint answers with JSON
//! `{"url": ..., "size": ...}`. Fetch is a plain GET against the
//! returned URL, with a `Range` header when only a sub-range of the
//! ciphertext is needed. The backend is append-only; no delete or
//! update is ever issued. The adapter performs no retries — any
//! transport error is immediately fatal to the calling operation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::RANGE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::StorageError;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// What an endpoint reports back for a stored block.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredBlob {
    /// Fetchable URL of the stored ciphertext.
    pub url: String,
    /// Stored byte size.
    pub size: u64,
}

/// Immutable endpoint list plus the shared rotation cursor.
pub struct BackendPool {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
    http: reqwest::Client,
}

impl BackendPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        assert!(!endpoints.is_empty(), "at least one backend endpoint required");
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
            http: reqwest::Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()
                .expect("reqwest client construction should not fail"),
        }
    }

    /// Select the next endpoint: position `i mod N` for the i-th call.
    ///
    /// The cursor is the only piece of cross-request mutable state in
    /// the storage layer, so it lives here and is advanced atomically.
    pub fn next(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }

    /// Upload one encrypted block to the next endpoint in rotation.
    pub async fn upload_block(&self, name: &str, bytes: Vec<u8>) -> Result<StoredBlob, StorageError> {
        let endpoint = self.next();
        let form = Form::new().part(
            "file",
            Part::bytes(bytes).file_name(name.to_string()),
        );

        let response = self
            .http
            .post(endpoint)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let stored: StoredBlob = response.json().await?;
        tracing::debug!("uploaded block {} ({} bytes) to {}", name, stored.size, endpoint);
        Ok(stored)
    }

    /// Fetch a stored block, optionally only the inclusive byte range
    /// `[start, end]` of its ciphertext.
    pub async fn fetch_block(
        &self,
        url: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Bytes, StorageError> {
        let mut request = self.http.get(url);
        if let Some((start, end)) = range {
            request = request.header(RANGE, format!("bytes={}-{}", start, end));
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
