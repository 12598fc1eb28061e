//! Per-block AES-256-CTR encryption keyed by a per-file secret.
//!
//! Key derivation: SHA-256(secret) -> 256-bit AES key
//! Encryption: AES-256-CTR with a random 16-byte nonce per block
//! Ciphertext length always equals plaintext length (pure keystream XOR).
//!
//! There is no authentication tag. This is confidentiality only, by
//! design: a tampered ciphertext or a wrong secret decrypts silently to
//! wrong plaintext. Integrity is out of scope for this store.
//!
//! CTR keystreams are seekable, which the read path relies on: a
//! partially fetched block is decrypted by seeking the keystream to the
//! block-local byte offset before applying it.

use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use rand::Rng;
use sha2::{Digest, Sha256};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Nonce length in bytes (AES block size, used as the CTR IV).
pub const NONCE_LEN: usize = 16;

/// Derive the 256-bit block cipher key from a file secret.
pub fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// Generate a fresh file secret: 32 random bytes, hex-encoded.
///
/// The secret is a bearer capability. It is handed to the uploader
/// exactly once and never persisted server-side.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

/// Encrypt one block. Returns `(nonce_hex, ciphertext)`.
///
/// A fresh random nonce is drawn per call, so encrypting identical
/// plaintext twice yields different ciphertext.
pub fn encrypt_block(secret: &str, plaintext: &[u8]) -> (String, Vec<u8>) {
    let key = derive_key(secret);
    let nonce: [u8; NONCE_LEN] = rand::rng().random();
    let mut cipher = Aes256Ctr::new(&key.into(), &nonce.into());
    let mut out = plaintext.to_vec();
    cipher.apply_keystream(&mut out);
    (hex::encode(nonce), out)
}

/// Streaming decryptor for one block's ciphertext.
///
/// Reconstructs the keystream from the secret and the block's stored
/// nonce. `seek` positions the keystream at an arbitrary byte offset
/// within the block, so a ciphertext fetched from a nonzero offset
/// still decrypts exactly.
pub struct BlockDecryptor {
    cipher: Aes256Ctr,
}

impl BlockDecryptor {
    /// Build a decryptor from the secret and the hex-encoded nonce.
    ///
    /// Fails only on a malformed nonce; a wrong secret is undetectable
    /// here and surfaces as garbage plaintext downstream.
    pub fn new(secret: &str, nonce_hex: &str) -> Result<Self, String> {
        let nonce: [u8; NONCE_LEN] = hex::decode(nonce_hex)
            .map_err(|e| format!("invalid block nonce: {}", e))?
            .try_into()
            .map_err(|_| format!("block nonce must be {} bytes", NONCE_LEN))?;
        let key = derive_key(secret);
        Ok(Self {
            cipher: Aes256Ctr::new(&key.into(), &nonce.into()),
        })
    }

    /// Position the keystream at `offset` bytes into the block.
    pub fn seek(&mut self, offset: u64) {
        self.cipher.seek(offset);
    }

    /// Decrypt `buf` in place, advancing the keystream.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}
