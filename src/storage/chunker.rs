//! Fixed-size slicing of an incoming byte stream.
//!
//! The request body arrives as arbitrarily framed buffers; the chunker
//! re-frames them into blocks of exactly `block_size` bytes, in order,
//! with the remainder (1..block_size bytes) emitted by `finish`.

use bytes::{Bytes, BytesMut};

/// Default block size: 7.5 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 7_864_320;

/// Accumulates pushed bytes and emits full fixed-size blocks.
///
/// One chunker serves exactly one stream; it is not seekable and not
/// reusable after `finish`.
pub struct Chunker {
    block_size: usize,
    buf: BytesMut,
}

impl Chunker {
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        Self {
            block_size,
            buf: BytesMut::with_capacity(block_size),
        }
    }

    /// Append incoming bytes and return every complete block now available.
    ///
    /// A single large push can yield multiple blocks; a small push may
    /// yield none. Emission order is exactly arrival order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);
        let mut blocks = Vec::new();
        while self.buf.len() >= self.block_size {
            blocks.push(self.buf.split_to(self.block_size).freeze());
        }
        blocks
    }

    /// Consume the chunker and return the final partial block, if any.
    pub fn finish(self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.freeze())
        }
    }
}
