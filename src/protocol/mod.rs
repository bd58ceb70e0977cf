//! # Wire Protocol
//!
//! Byte-level framing and the session handshake.
//!
//! This module owns everything that touches raw bytes: the fixed init
//! marker, length-prefixed field encoding, the encrypted frame layout,
//! and the handshake state machine that upgrades a plaintext socket to
//! an encrypted session.
//!
//! ## Components
//! - **FramedChannel**: exact-length reads over a socket's read half
//! - **HandshakeEngine**: `AwaitInit -> AwaitKey -> Established`
//! - **SealedFrame**: one encrypted application packet
//!
//! ## Wire Format
//! ```text
//! client -> server   [InitMarker(8)]
//! server -> client   [Len(4)][Generator ASCII] [Len(4)][Prime] [Len(4)][ServerPublic]
//! client -> server   [Len(4)][ClientPublic]
//! established        [Len(4)] [PayloadLen(4)] [Ciphertext(Len)]
//! ```
//! All multi-byte integers are big-endian. Ciphertext is whole 16-byte
//! blocks; `PayloadLen` says how much of the decrypted frame is payload.
//!
//! ## Security
//! - Field and frame lengths are validated before allocation
//! - A bad init marker aborts the connection with no response bytes
//! - Handshake states are strictly monotonic and never re-entered

pub mod framing;
pub mod handshake;

pub use framing::{FramedChannel, SealedFrame};
pub use handshake::{HandshakeEngine, HandshakeState};

/// Plaintext marker every client must send before anything else
pub const INIT_MARKER: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10];

/// Upper bound on a handshake field's declared length (64 KiB)
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Upper bound on an encrypted frame's declared ciphertext length (1 MiB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;
