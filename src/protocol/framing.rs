//! Exact-length framing over a connection's read half.
//!
//! Every read either returns the complete item or fails; partial data is
//! never handed up. Any I/O failure, including a clean EOF, surfaces as
//! `GateError::TransportClosed` because from this layer's point of view
//! the transport is simply gone.
//!
//! Length claims are validated against the module limits before any
//! allocation happens.

use crate::crypto::cipher::SessionCipher;
use crate::error::{constants, GateError, Result};
use crate::protocol::{MAX_FIELD_LEN, MAX_FRAME_LEN};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reader side of one connection's byte stream
pub struct FramedChannel<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> FramedChannel<R> {
    /// Wrap a read half
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read exactly `n` bytes.
    ///
    /// # Errors
    /// `GateError::TransportClosed` if the stream ends or errors first.
    pub async fn read_exact_buf(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|_| GateError::TransportClosed)?;
        Ok(buf)
    }

    /// Read one length-prefixed field: a 4-byte big-endian length, then
    /// that many payload bytes.
    ///
    /// # Errors
    /// `GateError::ProtocolViolation` for a length claim over
    /// [`MAX_FIELD_LEN`]; `GateError::TransportClosed` for any I/O
    /// failure.
    pub async fn read_length_prefixed(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32_be().await? as usize;
        if len > MAX_FIELD_LEN {
            return Err(GateError::ProtocolViolation(format!(
                "{}: {} bytes",
                constants::ERR_FIELD_TOO_LARGE,
                len
            )));
        }
        self.read_exact_buf(len).await
    }

    /// Read one encrypted frame: a 4-byte big-endian ciphertext length
    /// `L`, then `L + 4` bytes, of which the first 4 are the frame's
    /// sub-header and the rest is ciphertext. Neither part is
    /// interpreted here.
    ///
    /// # Errors
    /// `GateError::ProtocolViolation` for a length claim over
    /// [`MAX_FRAME_LEN`]; `GateError::TransportClosed` for any I/O
    /// failure.
    pub async fn read_encrypted_frame(&mut self) -> Result<SealedFrame> {
        let len = self.read_u32_be().await? as usize;
        if len > MAX_FRAME_LEN {
            return Err(GateError::ProtocolViolation(format!(
                "{}: {} bytes",
                constants::ERR_FRAME_TOO_LARGE,
                len
            )));
        }

        let mut header = [0u8; 4];
        self.reader
            .read_exact(&mut header)
            .await
            .map_err(|_| GateError::TransportClosed)?;
        let ciphertext = self.read_exact_buf(len).await?;

        Ok(SealedFrame { header, ciphertext })
    }

    async fn read_u32_be(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|_| GateError::TransportClosed)?;
        Ok(u32::from_be_bytes(buf))
    }
}

/// One encrypted application frame as read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFrame {
    /// Frame sub-header: the declared payload length, big-endian
    pub header: [u8; 4],
    /// Whole-block ciphertext
    pub ciphertext: Vec<u8>,
}

impl SealedFrame {
    /// The payload length the sender declared for this frame
    pub fn declared_len(&self) -> usize {
        u32::from_be_bytes(self.header) as usize
    }

    /// Decrypt the frame and truncate to the declared payload length.
    ///
    /// # Errors
    /// `GateError::ProtocolViolation` if the ciphertext is empty or
    /// unaligned, or if the declared length exceeds the decrypted bytes.
    pub fn open(&self, cipher: &SessionCipher) -> Result<Vec<u8>> {
        let mut plaintext = cipher.decrypt(&self.ciphertext)?;
        let declared = self.declared_len();
        if declared > plaintext.len() {
            return Err(GateError::ProtocolViolation(format!(
                "{}: {} > {}",
                constants::ERR_FRAME_SHORT_PAYLOAD,
                declared,
                plaintext.len()
            )));
        }
        plaintext.truncate(declared);
        Ok(plaintext)
    }

    /// Encrypt a payload into complete frame bytes ready for the wire.
    pub fn seal(cipher: &SessionCipher, payload: &[u8]) -> Vec<u8> {
        let ciphertext = cipher.encrypt(payload);
        let mut buf = BytesMut::with_capacity(8 + ciphertext.len());
        buf.put_u32(ciphertext.len() as u32);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(&ciphertext);
        buf.to_vec()
    }
}

/// Append one length-prefixed field
pub fn put_field(buf: &mut BytesMut, payload: &[u8]) {
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
}

/// Encode one length-prefixed field
pub fn encode_field(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    put_field(&mut buf, payload);
    buf.to_vec()
}

/// Encode the server's key-exchange response: generator (decimal ASCII),
/// prime modulus bytes, and server public key bytes, each length-prefixed,
/// in that order.
pub fn encode_key_exchange(generator: &[u8], prime: &[u8], public: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(12 + generator.len() + prime.len() + public.len());
    put_field(&mut buf, generator);
    put_field(&mut buf, prime);
    put_field(&mut buf, public);
    buf.to_vec()
}
