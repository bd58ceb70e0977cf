//! # Session Cryptography
//!
//! Key exchange and the per-session cipher.
//!
//! The handshake performs a finite-field Diffie-Hellman exchange over a
//! fixed 2048-bit group, hashes the shared secret down to a 16-byte
//! session key, and hands that key to a block cipher that seals every
//! application frame for the life of the connection.
//!
//! ## Components
//! - [`keyx`]: group parameters, keypair generation, shared-secret and
//!   session-key derivation
//! - [`cipher`]: the 16-byte-block [`SessionCipher`] keyed by the derived
//!   session key
//!
//! Null-key mode (an emergency configuration, off by default) bypasses
//! the exchange entirely and runs the cipher under an all-zero key.

pub mod cipher;
pub mod keyx;

pub use cipher::{SessionCipher, BLOCK_LEN};
pub use keyx::{
    compute_shared_secret, derive_keypair, derive_session_key, DhKeyPair, DhParams, SessionKey,
    SESSION_KEY_LEN,
};
