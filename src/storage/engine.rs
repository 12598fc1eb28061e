//! Storage engine: chunk -> encrypt -> upload on write, and
//! resolve -> fetch -> seek -> decrypt -> emit on read.
//!
//! Each operation is one strictly sequential per-block pipeline. No
//! intra-file parallelism: memory stays bounded at roughly one block,
//! and blocks complete in order.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::backend::BackendPool;
use crate::storage::chunker::Chunker;
use crate::storage::crypto::{self, BlockDecryptor};
use crate::storage::range::{self, BlockSpan};

/// Everything the journal needs to persist about one stored block.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    pub name: String,
    pub url: String,
    pub size: u64,
    /// Hex-encoded CTR nonce. `None` marks a block stored in clear
    /// (the column is nullable in the legacy schema); every block this
    /// engine writes carries one.
    pub nonce: Option<String>,
    /// 0-based position within the file. Block bytes concatenated in
    /// `seq` order reproduce the original stream.
    pub seq: i64,
}

/// Result of a successful write: the ordered descriptors plus the
/// never-persisted capability secret. Journaling is the caller's job.
#[derive(Debug)]
pub struct WriteOutcome {
    pub secret: String,
    pub blocks: Vec<BlockDescriptor>,
}

impl WriteOutcome {
    /// Total plaintext size (the cipher is length-preserving).
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

pub struct StorageEngine {
    backend: BackendPool,
    block_size: usize,
}

impl StorageEngine {
    pub fn new(backend: BackendPool, block_size: usize) -> Self {
        Self { backend, block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Consume a request body stream and upload it block by block.
    ///
    /// A fresh secret is generated per write. Any body error (the abort
    /// signal: client disconnect mid-upload) or backend failure fails
    /// the whole write. Blocks already uploaded stay on the backend
    /// (the upload contract is append-only, reclamation is out of
    /// scope), but nothing reaches the journal.
    pub async fn write<S, E>(&self, mut body: S) -> Result<WriteOutcome, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let secret = crypto::generate_secret();
        let mut chunker = Chunker::new(self.block_size);
        let mut blocks: Vec<BlockDescriptor> = Vec::new();

        while let Some(frame) = body.next().await {
            let data = frame.map_err(|e| StorageError::UploadAborted(e.to_string()))?;
            for chunk in chunker.push(&data) {
                self.store_chunk(&secret, &chunk, &mut blocks).await?;
            }
        }
        if let Some(tail) = chunker.finish() {
            self.store_chunk(&secret, &tail, &mut blocks).await?;
        }

        Ok(WriteOutcome { secret, blocks })
    }

    async fn store_chunk(
        &self,
        secret: &str,
        chunk: &[u8],
        blocks: &mut Vec<BlockDescriptor>,
    ) -> Result<(), StorageError> {
        let (nonce, ciphertext) = crypto::encrypt_block(secret, chunk);
        let name = Uuid::new_v4().to_string();
        let stored = self.backend.upload_block(&name, ciphertext).await?;
        blocks.push(BlockDescriptor {
            name,
            url: stored.url,
            size: stored.size,
            nonce: Some(nonce),
            seq: blocks.len() as i64,
        });
        Ok(())
    }

    /// Fetch, decrypt, and emit a file (or an inclusive byte range of
    /// it) into `tx` in order.
    ///
    /// Boundary blocks of a ranged read are fetched with an HTTP Range
    /// header for just the needed ciphertext, and the CTR keystream is
    /// seeked to the block-local offset before decrypting. The
    /// keystream position must match the ciphertext's byte offset
    /// exactly or the output is garbage.
    ///
    /// A dropped receiver means the client went away; the read stops
    /// quietly. Bytes already sent stay sent.
    pub async fn read(
        &self,
        blocks: &[BlockDescriptor],
        secret: &str,
        range: Option<(u64, u64)>,
        tx: &mpsc::Sender<Result<Bytes, std::io::Error>>,
    ) -> Result<(), StorageError> {
        let spans: Vec<BlockSpan> = match range {
            Some((start, end)) => {
                let sizes: Vec<u64> = blocks.iter().map(|b| b.size).collect();
                range::resolve(&sizes, self.block_size as u64, start, end)
            }
            None => blocks
                .iter()
                .enumerate()
                .map(|(index, b)| BlockSpan {
                    index,
                    start: 0,
                    end: b.size.saturating_sub(1),
                })
                .collect(),
        };

        for span in spans {
            let block = &blocks[span.index];
            let fetch_range = span
                .is_partial(block.size)
                .then_some((span.start, span.end));
            let payload = self.backend.fetch_block(&block.url, fetch_range).await?;

            let mut buf = payload.to_vec();
            if let Some(nonce) = &block.nonce {
                let mut decryptor =
                    BlockDecryptor::new(secret, nonce).map_err(StorageError::Decrypt)?;
                decryptor.seek(span.start);
                decryptor.apply(&mut buf);
            }

            if tx.send(Ok(Bytes::from(buf))).await.is_err() {
                tracing::debug!("download receiver dropped, stopping read");
                return Ok(());
            }
        }
        Ok(())
    }
}
