//! Finite-field key exchange for the session handshake.
//!
//! The exchange runs over a fixed 2048-bit MODP group (RFC 3526 group 14,
//! generator 2). The server generates an ephemeral keypair per connection,
//! sends the group and its public key during the handshake, and combines
//! the client's public key with its own private exponent to reach the
//! shared secret. The 16-byte session key is the truncated SHA-256 digest
//! of the shared secret's big-endian bytes.
//!
//! Private exponents live only for the duration of one handshake; the
//! source entropy buffer is zeroized as soon as the exponent is built.

use crate::error::{constants, GateError, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

/// Length of the derived symmetric session key in bytes
pub const SESSION_KEY_LEN: usize = 16;

/// Private exponents are drawn from this many random bytes
const PRIVATE_EXPONENT_LEN: usize = 32;

/// RFC 3526 group 14: 2048-bit MODP prime, big-endian
const MODP_2048_PRIME_BE: &[u8; 256] =
    b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xC9\x0F\xDA\xA2\x21\x68\xC2\x34\
\xC4\xC6\x62\x8B\x80\xDC\x1C\xD1\x29\x02\x4E\x08\x8A\x67\xCC\x74\
\x02\x0B\xBE\xA6\x3B\x13\x9B\x22\x51\x4A\x08\x79\x8E\x34\x04\xDD\
\xEF\x95\x19\xB3\xCD\x3A\x43\x1B\x30\x2B\x0A\x6D\xF2\x5F\x14\x37\
\x4F\xE1\x35\x6D\x6D\x51\xC2\x45\xE4\x85\xB5\x76\x62\x5E\x7E\xC6\
\xF4\x4C\x42\xE9\xA6\x37\xED\x6B\x0B\xFF\x5C\xB6\xF4\x06\xB7\xED\
\xEE\x38\x6B\xFB\x5A\x89\x9F\xA5\xAE\x9F\x24\x11\x7C\x4B\x1F\xE6\
\x49\x28\x66\x51\xEC\xE4\x5B\x3D\xC2\x00\x7C\xB8\xA1\x63\xBF\x05\
\x98\xDA\x48\x36\x1C\x55\xD3\x9A\x69\x16\x3F\xA8\xFD\x24\xCF\x5F\
\x83\x65\x5D\x23\xDC\xA3\xAD\x96\x1C\x62\xF3\x56\x20\x85\x52\xBB\
\x9E\xD5\x29\x07\x70\x96\x96\x6D\x67\x0C\x35\x4E\x4A\xBC\x98\x04\
\xF1\x74\x6C\x08\xCA\x18\x21\x7C\x32\x90\x5E\x46\x2E\x36\xCE\x3B\
\xE3\x9E\x77\x2C\x18\x0E\x86\x03\x9B\x27\x83\xA2\xEC\x07\xA2\x8F\
\xB5\xC5\x5D\xF0\x6F\x4C\x52\xC9\xDE\x2B\xCB\xF6\x95\x58\x17\x18\
\x39\x95\x49\x7C\xEA\x95\x6A\xE5\x15\xD2\x26\x18\x98\xFA\x05\x10\
\x15\x72\x8E\x5A\x8A\xAC\xAA\x68\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF";

/// The finite-field group a deployment runs its exchanges over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    /// Prime modulus
    pub prime: BigUint,
    /// Group generator
    pub generator: BigUint,
}

impl DhParams {
    /// The standard deployment group: RFC 3526 group 14, generator 2
    pub fn modp_2048() -> Self {
        Self {
            prime: BigUint::from_bytes_be(MODP_2048_PRIME_BE),
            generator: BigUint::from(2u32),
        }
    }

    /// The generator rendered as decimal ASCII, as the wire carries it
    pub fn generator_ascii(&self) -> Vec<u8> {
        self.generator.to_str_radix(10).into_bytes()
    }

    /// The prime modulus as big-endian bytes, as the wire carries it
    pub fn prime_bytes(&self) -> Vec<u8> {
        self.prime.to_bytes_be()
    }
}

impl Default for DhParams {
    fn default() -> Self {
        Self::modp_2048()
    }
}

/// One side's ephemeral keypair for a single handshake
pub struct DhKeyPair {
    private: BigUint,
    /// Public key (`generator^private mod prime`)
    pub public: BigUint,
}

impl DhKeyPair {
    /// Public key as big-endian bytes, as the wire carries it
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Combine the peer's public key with this private exponent
    pub fn shared_secret(&self, peer_public: &BigUint, params: &DhParams) -> Result<BigUint> {
        compute_shared_secret(peer_public, &self.private, &params.prime)
    }
}

/// Generate an ephemeral keypair over the given group.
///
/// # Errors
/// Returns `GateError::HandshakeFailed` if the OS entropy source fails.
pub fn derive_keypair(params: &DhParams) -> Result<DhKeyPair> {
    let private = random_exponent()?;
    let public = params.generator.modpow(&private, &params.prime);
    Ok(DhKeyPair { private, public })
}

/// Compute the shared secret `peer_public^private mod prime`.
///
/// Degenerate peer keys (0, 1, p-1, or out of range) contribute no secrecy
/// and are rejected outright.
///
/// # Errors
/// Returns `GateError::HandshakeFailed` for a degenerate peer key.
pub fn compute_shared_secret(
    peer_public: &BigUint,
    private: &BigUint,
    prime: &BigUint,
) -> Result<BigUint> {
    let p_minus_one = prime - BigUint::one();
    if peer_public.is_zero()
        || peer_public.is_one()
        || *peer_public >= p_minus_one
    {
        return Err(GateError::HandshakeFailed(
            constants::ERR_DEGENERATE_PEER_KEY.into(),
        ));
    }
    Ok(peer_public.modpow(private, prime))
}

/// Hash the shared secret down to the 16-byte session key
pub fn derive_session_key(shared: &BigUint) -> SessionKey {
    let digest = Sha256::digest(shared.to_bytes_be());
    let mut key = [0u8; SESSION_KEY_LEN];
    key.copy_from_slice(&digest[..SESSION_KEY_LEN]);
    SessionKey(key)
}

/// 16-byte symmetric key shared by both ends of an established session
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SessionKey(pub(crate) [u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// The all-zero key used by null-key mode
    pub fn zero() -> Self {
        Self([0u8; SESSION_KEY_LEN])
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

/// Draw a nonzero private exponent from OS randomness
fn random_exponent() -> Result<BigUint> {
    loop {
        let mut buf = Zeroizing::new([0u8; PRIVATE_EXPONENT_LEN]);
        getrandom::fill(buf.as_mut_slice())
            .map_err(|_| GateError::HandshakeFailed(constants::ERR_ENTROPY.into()))?;
        let exponent = BigUint::from_bytes_be(buf.as_slice());
        if !exponent.is_zero() {
            return Ok(exponent);
        }
    }
}
