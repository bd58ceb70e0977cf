//! Per-session block cipher.
//!
//! Established sessions seal every application frame with AES-128 under
//! the 16-byte session key. Frames are whole blocks; a frame's true
//! payload length travels in its sub-header, so encryption pads with
//! zeros and decryption hands back whole blocks for the caller to
//! truncate.

use crate::crypto::keyx::SessionKey;
use crate::error::{constants, GateError, Result};
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use std::fmt;

/// Cipher block length in bytes; ciphertext is always a multiple of this
pub const BLOCK_LEN: usize = 16;

/// Symmetric cipher bound to one session's key
#[derive(Clone)]
pub struct SessionCipher {
    inner: Aes128,
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // key schedule stays out of logs and assertion output
        f.debug_struct("SessionCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SessionCipher {
    /// Build the cipher for a derived (or null-mode) session key
    pub fn new(key: &SessionKey) -> Self {
        Self {
            inner: Aes128::new(GenericArray::from_slice(key.as_bytes())),
        }
    }

    /// Decrypt whole blocks of ciphertext.
    ///
    /// # Errors
    /// Returns `GateError::ProtocolViolation` when the input is empty or
    /// not block-aligned.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Err(GateError::ProtocolViolation(
                constants::ERR_FRAME_EMPTY.into(),
            ));
        }
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(GateError::ProtocolViolation(
                constants::ERR_FRAME_UNALIGNED.into(),
            ));
        }

        let mut out = ciphertext.to_vec();
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.inner.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(out)
    }

    /// Encrypt a payload, zero-padding it up to whole blocks.
    ///
    /// An empty payload still produces one block so the frame carries
    /// ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let padded = plaintext.len().div_ceil(BLOCK_LEN).max(1) * BLOCK_LEN;

        let mut out = vec![0u8; padded];
        out[..plaintext.len()].copy_from_slice(plaintext);
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.inner.encrypt_block(GenericArray::from_mut_slice(block));
        }
        out
    }
}
