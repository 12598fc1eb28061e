use std::sync::Arc;

use crate::db::DbPool;
use crate::storage::engine::StorageEngine;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Chunk/cipher/backend pipeline (owns the endpoint rotation cursor)
    pub engine: Arc<StorageEngine>,
    /// Read window for open-ended Range requests
    pub range_window: u64,
}
