/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// File record in the files table. Immutable after creation except
/// `last_access`, which is touched on every successful download.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub last_access: String,
}

/// One stored block of a file. Blocks ordered by `seq` concatenate to
/// the original byte stream.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub id: String,
    pub file_id: String,
    pub seq: i64,
    pub url: String,
    pub size: i64,
    /// Hex-encoded CTR nonce; NULL marks a block stored in clear.
    pub nonce: Option<String>,
    pub created_at: String,
}
