//! Chunked RSA/PKCS#1 v1.5 encryption for payloads larger than one block.
//!
//! An RSA key of `n` bytes can encrypt at most `n - 11` bytes of plaintext
//! under PKCS#1 v1.5 padding and always yields exactly `n` bytes of
//! ciphertext. Longer payloads are split into `n - 11` byte chunks, each
//! encrypted independently, and the ciphertext blocks are concatenated with
//! no length prefixes. Decryption walks the ciphertext in `n` byte reads.

use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::error::{Result, StorageError};

/// Bytes of padding overhead PKCS#1 v1.5 adds to every block.
pub const PKCS1_OVERHEAD: usize = 11;

/// Splits and reassembles payloads around a fixed-size asymmetric block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedCipher {
    key_size_bytes: usize,
}

impl ChunkedCipher {
    /// Create a cipher for a key of `key_bits` bits.
    pub const fn new(key_bits: usize) -> Self {
        Self {
            key_size_bytes: key_bits / 8,
        }
    }

    /// Key size in bytes.
    pub const fn key_size_bytes(&self) -> usize {
        self.key_size_bytes
    }

    /// Largest plaintext chunk one block can carry (245 for 2048-bit keys).
    pub const fn max_plaintext_chunk(&self) -> usize {
        self.key_size_bytes.saturating_sub(PKCS1_OVERHEAD)
    }

    /// Size of one ciphertext block (256 for 2048-bit keys).
    pub const fn max_ciphertext_chunk(&self) -> usize {
        self.key_size_bytes
    }

    /// Encrypt `plaintext`, calling `encrypt_block` once per chunk.
    ///
    /// Payloads that fit in a single chunk, including the empty payload, are
    /// encrypted with exactly one call.
    pub fn encrypt<F>(&self, plaintext: &[u8], mut encrypt_block: F) -> Result<Vec<u8>>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>>,
    {
        let limit = self.max_plaintext_chunk();
        if limit == 0 {
            return Err(StorageError::Crypto(format!(
                "key of {} bytes cannot carry PKCS#1 v1.5 padding",
                self.key_size_bytes
            )));
        }

        if plaintext.len() <= limit {
            return encrypt_block(plaintext);
        }

        let blocks = plaintext.len().div_ceil(limit);
        let mut out = Vec::with_capacity(blocks * self.max_ciphertext_chunk());
        for chunk in plaintext.chunks(limit) {
            out.extend_from_slice(&encrypt_block(chunk)?);
        }
        Ok(out)
    }

    /// Decrypt `ciphertext`, calling `decrypt_block` once per block.
    ///
    /// A trailing block shorter than the key size is passed through as-is;
    /// it succeeds only if the block operation accepts it.
    pub fn decrypt<F>(&self, ciphertext: &[u8], mut decrypt_block: F) -> Result<Vec<u8>>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>>,
    {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.max_ciphertext_chunk();
        if limit == 0 {
            return Err(StorageError::Crypto("zero-length key".to_string()));
        }

        if ciphertext.len() <= limit {
            return decrypt_block(ciphertext);
        }

        let mut out = Vec::with_capacity(ciphertext.len());
        for block in ciphertext.chunks(limit) {
            out.extend_from_slice(&decrypt_block(block)?);
        }
        Ok(out)
    }

    /// Encrypt `plaintext` with an RSA public key.
    pub fn encrypt_with_public_key(
        &self,
        public_key: &RsaPublicKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        self.encrypt(plaintext, |chunk| {
            public_key
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
                .map_err(|e| StorageError::Crypto(format!("block encryption failed: {e}")))
        })
    }
}
