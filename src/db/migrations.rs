use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses the SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: files and their ordered blocks

CREATE TABLE files (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_access TEXT NOT NULL
);

CREATE TABLE blocks (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    url TEXT NOT NULL,
    size INTEGER NOT NULL,
    nonce TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (file_id) REFERENCES files(id)
);

CREATE INDEX idx_blocks_file ON blocks(file_id);
CREATE UNIQUE INDEX idx_blocks_file_seq ON blocks(file_id, seq);
",
    )])
}
