//! Block storage pipeline for the scatterfs server.
//!
//! Files are split into fixed-size blocks, each block encrypted with
//! AES-256-CTR under a key derived from a per-file secret, then uploaded
//! round-robin across the configured remote blob endpoints. Reads run the
//! pipeline in reverse: resolve the requested byte range to its covering
//! blocks, fetch each (boundary blocks partially, via HTTP Range), seek
//! the keystream, decrypt, and emit plaintext in order.
//!
//! The secret is a bearer capability: it is returned to the uploader once
//! and never persisted. Knowing (file id, secret) is both necessary and
//! sufficient to read a file.

pub mod backend;
pub mod chunker;
pub mod crypto;
pub mod engine;
pub mod range;
