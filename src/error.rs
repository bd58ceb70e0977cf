//! # Error Types
//!
//! Error handling for the connection layer.
//!
//! This module defines every error variant the crate produces, from raw
//! socket failures to handshake and framing violations.
//!
//! ## Error Categories
//! - **Transport**: the peer went away, or a read/write could not complete
//! - **Protocol**: the peer sent bytes the wire format forbids
//! - **Handshake**: key-exchange arithmetic or derivation failed
//! - **Handler**: an injected role handler rejected a packet
//! - **Config / I/O**: startup and environment failures
//!
//! Each category carries its own logging severity at the call sites:
//! protocol violations are warnings, transport closes are routine,
//! handshake failures are errors, handler errors are logged without
//! ending the connection.
//!
//! ## Example Usage
//! ```rust
//! use gatenet::error::{GateError, Result};
//!
//! fn reject_oversized(len: usize, max: usize) -> Result<()> {
//!     if len > max {
//!         return Err(GateError::ProtocolViolation(format!(
//!             "field of {len} bytes exceeds limit of {max}"
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! assert!(reject_oversized(70_000, 65_536).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to keep wording consistent across call sites.
/// Static strings are borrowed, avoiding heap allocations for common cases.
pub mod constants {
    /// Handshake wire errors
    pub const ERR_BAD_INIT_MARKER: &str = "Init marker mismatch";
    pub const ERR_HANDSHAKE_OUT_OF_ORDER: &str = "Handshake input out of order";
    pub const ERR_NULL_KEY_SENTINEL: &str = "Client key is not the null-key sentinel";
    pub const ERR_DEGENERATE_PEER_KEY: &str = "Peer public key is degenerate";
    pub const ERR_SERVER_KEY_NOT_FOUND: &str = "Server keypair not found";

    /// Framing errors
    pub const ERR_FIELD_TOO_LARGE: &str = "Length-prefixed field exceeds limit";
    pub const ERR_FRAME_TOO_LARGE: &str = "Encrypted frame exceeds limit";
    pub const ERR_FRAME_EMPTY: &str = "Encrypted frame carries no ciphertext";
    pub const ERR_FRAME_UNALIGNED: &str = "Ciphertext is not block-aligned";
    pub const ERR_FRAME_SHORT_PAYLOAD: &str = "Declared payload length exceeds decrypted bytes";

    /// Key material errors
    pub const ERR_ENTROPY: &str = "Entropy source failure";
}

/// GateError is the primary error type for all connection-layer operations
#[derive(Error, Debug)]
pub enum GateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer disconnected or a read/write could not complete.
    /// This is the normal end of every connection's life.
    #[error("Transport closed")]
    TransportClosed,

    /// The peer sent bytes the wire format forbids. The connection is
    /// aborted without a response.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Key exchange arithmetic or session-key derivation failed.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// An injected role handler returned an error. The connection
    /// keeps running; the error is logged and counted.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Results using GateError
pub type Result<T> = std::result::Result<T, GateError>;
