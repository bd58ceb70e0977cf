//! Session handshake state machine.
//!
//! Every accepted socket starts in plaintext and must walk this machine
//! exactly once: `AwaitInit -> AwaitKey -> Established`. States are
//! strictly monotonic; no input is ever processed out of order and no
//! state is re-entered.
//!
//! The engine is deliberately free of I/O. The connection task reads the
//! bytes, feeds them in, and writes whatever the engine hands back:
//!
//! - `on_init` consumes the 8-byte init marker and returns the
//!   key-exchange response (generator, prime, server public key, each
//!   length-prefixed).
//! - `on_client_key` consumes the client's public-key field and yields
//!   the session cipher.
//!
//! A wrong init marker is a protocol violation: the engine returns an
//! error before producing a single response byte, and the caller aborts
//! the connection silently.
//!
//! **Per-Session State**: each connection owns its engine. Key material
//! never crosses sessions, and the ephemeral keypair is dropped as soon
//! as the shared secret exists.

use crate::crypto::cipher::SessionCipher;
use crate::crypto::keyx::{derive_keypair, derive_session_key, DhKeyPair, DhParams, SessionKey};
use crate::error::{constants, GateError, Result};
use crate::protocol::framing::encode_key_exchange;
use crate::protocol::INIT_MARKER;
use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Where a connection stands in its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing received yet; the next bytes must be the init marker
    AwaitInit,
    /// Response sent; the next field must be the client's public key
    AwaitKey,
    /// Session key derived; the engine's work is done
    Established,
}

/// Per-connection handshake driver
pub struct HandshakeEngine {
    state: HandshakeState,
    params: Arc<DhParams>,
    null_key_mode: bool,
    keypair: Option<DhKeyPair>,
}

impl HandshakeEngine {
    /// Create an engine for one fresh connection
    pub fn new(params: Arc<DhParams>, null_key_mode: bool) -> Self {
        Self {
            state: HandshakeState::AwaitInit,
            params,
            null_key_mode,
            keypair: None,
        }
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Consume the client's init marker and produce the key-exchange
    /// response bytes.
    ///
    /// # Errors
    /// - `GateError::ProtocolViolation` if the marker is wrong or the
    ///   engine is past `AwaitInit`. No response bytes are produced.
    /// - `GateError::HandshakeFailed` if keypair generation fails.
    #[instrument(skip(self, marker))]
    pub fn on_init(&mut self, marker: &[u8]) -> Result<Vec<u8>> {
        if self.state != HandshakeState::AwaitInit {
            return Err(GateError::ProtocolViolation(
                constants::ERR_HANDSHAKE_OUT_OF_ORDER.into(),
            ));
        }
        if marker != INIT_MARKER {
            return Err(GateError::ProtocolViolation(
                constants::ERR_BAD_INIT_MARKER.into(),
            ));
        }

        let keypair = derive_keypair(&self.params)?;
        let response = encode_key_exchange(
            &self.params.generator_ascii(),
            &self.params.prime_bytes(),
            &keypair.public_bytes(),
        );
        self.keypair = Some(keypair);
        self.state = HandshakeState::AwaitKey;

        trace!(response_len = response.len(), "Init marker accepted");
        Ok(response)
    }

    /// Consume the client's public-key field and derive the session
    /// cipher.
    ///
    /// In null-key mode the field must be the sentinel, the single ASCII
    /// digit `0` that clients send, or any field decoding to integer
    /// zero. The session then runs under the all-zero key.
    ///
    /// # Errors
    /// - `GateError::ProtocolViolation` if the engine is not in
    ///   `AwaitKey`, or the null-key sentinel does not match.
    /// - `GateError::HandshakeFailed` for a degenerate client key or a
    ///   derivation failure.
    #[instrument(skip(self, field))]
    pub fn on_client_key(&mut self, field: &[u8]) -> Result<SessionCipher> {
        if self.state != HandshakeState::AwaitKey {
            return Err(GateError::ProtocolViolation(
                constants::ERR_HANDSHAKE_OUT_OF_ORDER.into(),
            ));
        }

        let key = if self.null_key_mode {
            // clients send the single ASCII digit "0" as the sentinel;
            // fields decoding to the integer zero count as well
            let is_sentinel = field == b"0" || BigUint::from_bytes_be(field).is_zero();
            if !is_sentinel {
                return Err(GateError::ProtocolViolation(
                    constants::ERR_NULL_KEY_SENTINEL.into(),
                ));
            }
            warn!("Null-key session established - traffic is not protected");
            SessionKey::zero()
        } else {
            let client_public = BigUint::from_bytes_be(field);
            let keypair = self.keypair.take().ok_or_else(|| {
                GateError::HandshakeFailed(constants::ERR_SERVER_KEY_NOT_FOUND.into())
            })?;
            let shared = keypair.shared_secret(&client_public, &self.params)?;
            derive_session_key(&shared)
        };

        self.keypair = None;
        self.state = HandshakeState::Established;
        debug!("Session key derived, handshake established");
        Ok(SessionCipher::new(&key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::protocol::framing::SealedFrame;

    fn engine(null_key_mode: bool) -> HandshakeEngine {
        HandshakeEngine::new(Arc::new(DhParams::modp_2048()), null_key_mode)
    }

    /// Split a key-exchange response back into its length-prefixed fields
    fn parse_fields(mut bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut fields = Vec::new();
        while !bytes.is_empty() {
            let (len_bytes, rest) = bytes.split_at(4);
            let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
            let (payload, rest) = rest.split_at(len);
            fields.push(payload.to_vec());
            bytes = rest;
        }
        fields
    }

    #[test]
    fn test_response_is_three_nonempty_fields_in_order() {
        let mut engine = engine(false);
        let response = engine.on_init(&INIT_MARKER).unwrap();

        let fields = parse_fields(&response);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], b"2");
        assert_eq!(fields[1].len(), 256);
        assert!(!fields[2].is_empty());
        assert_eq!(engine.state(), HandshakeState::AwaitKey);
    }

    #[test]
    fn test_full_exchange_agrees_on_the_cipher() {
        let params = DhParams::modp_2048();
        let mut engine = engine(false);

        let response = engine.on_init(&INIT_MARKER).unwrap();
        let fields = parse_fields(&response);
        let server_public = BigUint::from_bytes_be(&fields[2]);

        // client side of the exchange
        let client = derive_keypair(&params).unwrap();
        let shared = client.shared_secret(&server_public, &params).unwrap();
        let client_cipher = SessionCipher::new(&derive_session_key(&shared));

        let server_cipher = engine.on_client_key(&client.public_bytes()).unwrap();
        assert_eq!(engine.state(), HandshakeState::Established);

        // both ends seal and open each other's frames
        let wire = SealedFrame::seal(&client_cipher, b"enter the gate");
        let frame = SealedFrame {
            header: wire[4..8].try_into().unwrap(),
            ciphertext: wire[8..].to_vec(),
        };
        assert_eq!(frame.open(&server_cipher).unwrap(), b"enter the gate");
    }

    #[test]
    fn test_bad_marker_rejected_without_response() {
        let mut engine = engine(false);
        let mut marker = INIT_MARKER;
        marker[7] = 0x11;

        let err = engine.on_init(&marker).unwrap_err();
        assert!(matches!(err, GateError::ProtocolViolation(_)));
        assert_eq!(engine.state(), HandshakeState::AwaitInit);
    }

    #[test]
    fn test_short_marker_rejected() {
        let mut engine = engine(false);
        let err = engine.on_init(&INIT_MARKER[..5]).unwrap_err();
        assert!(matches!(err, GateError::ProtocolViolation(_)));
    }

    #[test]
    fn test_states_are_monotonic() {
        let mut engine = engine(false);

        // key before init
        let err = engine.on_client_key(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, GateError::ProtocolViolation(_)));

        // init twice
        engine.on_init(&INIT_MARKER).unwrap();
        let err = engine.on_init(&INIT_MARKER).unwrap_err();
        assert!(matches!(err, GateError::ProtocolViolation(_)));
        assert_eq!(engine.state(), HandshakeState::AwaitKey);
    }

    #[test]
    fn test_null_key_mode_accepts_sentinel_fields() {
        // the ASCII digit clients actually send, then fields that decode
        // to the integer zero
        for sentinel in [&b"0"[..], &[][..], &[0u8][..], &[0u8; 0x100][..]] {
            let mut engine = engine(true);
            engine.on_init(&INIT_MARKER).unwrap();
            let cipher = engine.on_client_key(sentinel).unwrap();
            assert_eq!(engine.state(), HandshakeState::Established);

            // interoperates with the all-zero key
            let zero_cipher = SessionCipher::new(&SessionKey::zero());
            let wire = SealedFrame::seal(&zero_cipher, b"fallback");
            let frame = SealedFrame {
                header: wire[4..8].try_into().unwrap(),
                ciphertext: wire[8..].to_vec(),
            };
            assert_eq!(frame.open(&cipher).unwrap(), b"fallback");
        }
    }

    #[test]
    fn test_null_key_mode_rejects_non_sentinel_key() {
        // "1" and "00" miss the one-byte sentinel; the last is a real key
        for field in [&b"1"[..], &b"00"[..], &[7u8; 16][..]] {
            let mut engine = engine(true);
            engine.on_init(&INIT_MARKER).unwrap();

            let err = engine.on_client_key(field).unwrap_err();
            assert!(matches!(err, GateError::ProtocolViolation(_)));
            assert_eq!(engine.state(), HandshakeState::AwaitKey);
        }
    }

    #[test]
    fn test_normal_mode_rejects_zero_key() {
        let mut engine = engine(false);
        engine.on_init(&INIT_MARKER).unwrap();

        let err = engine.on_client_key(&[0u8; 0x100]).unwrap_err();
        assert!(matches!(err, GateError::HandshakeFailed(_)));
    }
}
