//! Metadata journal: the persistence layer mapping a file id to its
//! ordered block descriptors.
//!
//! The file row and its block rows are written in one transaction — a
//! failure anywhere rolls the whole write back, so a file row without
//! blocks cannot exist. Reads join a file with its blocks `ORDER BY
//! seq`; storage-layer default ordering is never relied on.
//!
//! The capability secret never touches this layer.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::{BlockRow, FileRow};
use crate::db::DbPool;
use crate::error::StorageError;
use crate::storage::engine::BlockDescriptor;

/// A file joined with its ordered blocks, as handed to the gateway.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub last_access: String,
    pub blocks: Vec<BlockRow>,
}

impl FileMetadata {
    /// Total plaintext size (ciphertext is the same length).
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size as u64).sum()
    }

    /// Re-shape the stored rows into the engine's read-path input.
    pub fn descriptors(&self) -> Vec<BlockDescriptor> {
        self.blocks
            .iter()
            .map(|b| BlockDescriptor {
                name: b.id.clone(),
                url: b.url.clone(),
                size: b.size as u64,
                nonce: b.nonce.clone(),
                seq: b.seq,
            })
            .collect()
    }
}

/// Persist a completed write: one file row plus one block row per
/// descriptor, all inside a single transaction, then read back the
/// canonical joined metadata.
pub fn create_file(
    db: &DbPool,
    name: &str,
    blocks: &[BlockDescriptor],
) -> Result<FileMetadata, StorageError> {
    let mut conn = db.lock().expect("database mutex poisoned");
    let file_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO files (id, name, created_at, last_access) VALUES (?1, ?2, ?3, ?4)",
        params![file_id, name, now, now],
    )?;
    for block in blocks {
        tx.execute(
            "INSERT INTO blocks (id, file_id, seq, url, size, nonce, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                file_id,
                block.seq,
                block.url,
                block.size as i64,
                block.nonce,
                now,
            ],
        )?;
    }
    tx.commit()?;

    // Read back through the same canonical query the download path uses.
    get_file_on(&conn, &file_id)?.ok_or(StorageError::NotFound)
}

/// Look up a file and its blocks in seq order. `None` if unknown.
pub fn get_file(db: &DbPool, id: &str) -> Result<Option<FileMetadata>, StorageError> {
    let conn = db.lock().expect("database mutex poisoned");
    get_file_on(&conn, id)
}

fn get_file_on(conn: &Connection, id: &str) -> Result<Option<FileMetadata>, StorageError> {
    let file: Option<FileRow> = conn
        .query_row(
            "SELECT id, name, created_at, last_access FROM files WHERE id = ?1",
            params![id],
            |row| {
                Ok(FileRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    last_access: row.get(3)?,
                })
            },
        )
        .optional()?;

    let Some(file) = file else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, file_id, seq, url, size, nonce, created_at
         FROM blocks WHERE file_id = ?1 ORDER BY seq",
    )?;
    let blocks = stmt
        .query_map(params![id], |row| {
            Ok(BlockRow {
                id: row.get(0)?,
                file_id: row.get(1)?,
                seq: row.get(2)?,
                url: row.get(3)?,
                size: row.get(4)?,
                nonce: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(FileMetadata {
        id: file.id,
        name: file.name,
        created_at: file.created_at,
        last_access: file.last_access,
        blocks,
    }))
}

/// Update a file's last-access timestamp to now. Called on each
/// successful download; the caller treats failure as non-fatal.
pub fn touch_last_access(db: &DbPool, id: &str) -> Result<(), StorageError> {
    let conn = db.lock().expect("database mutex poisoned");
    conn.execute(
        "UPDATE files SET last_access = ?1 WHERE id = ?2",
        params![Utc::now().to_rfc3339(), id],
    )?;
    Ok(())
}
