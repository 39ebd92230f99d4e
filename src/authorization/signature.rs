//! HMAC-SHA256 signatures over canonical token material.
//!
//! Signed material is `"<cardId>:<token>"`. The token already embeds the
//! card id, so the id appears twice; previously issued signatures depend on
//! that exact byte string.

use hmac::digest::generic_array::GenericArray;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use std::fmt;

use super::error::KeyError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-rendered SHA-256 MAC.
pub const SIGNATURE_HEX_LEN: usize = 64;

/// SHA-256 block size, the length of an HMAC key block.
const KEY_BLOCK_LEN: usize = 64;

/// Secret used to sign and verify authorization tokens.
///
/// Holds the HMAC key block: the key zero-padded to the block size, or its
/// digest when longer. The block is zeroized on drop and the keyed MAC state
/// is rebuilt per call. `Debug` never prints key material.
pub struct SigningKey {
    inner: Secret<[u8; KEY_BLOCK_LEN]>,
}

impl SigningKey {
    /// Create from raw key bytes. Any non-empty length is accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.is_empty() {
            return Err(KeyError::Empty);
        }

        let mut block = [0u8; KEY_BLOCK_LEN];
        if bytes.len() > KEY_BLOCK_LEN {
            let digest = Sha256::digest(bytes);
            block[..digest.len()].copy_from_slice(&digest);
        } else {
            block[..bytes.len()].copy_from_slice(bytes);
        }

        Ok(Self {
            inner: Secret::new(block),
        })
    }

    /// Create from hex-encoded key bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = Secret::new(
            hex::decode(encoded.trim()).map_err(|e| KeyError::InvalidFormat(e.to_string()))?,
        );
        Self::from_bytes(bytes.expose_secret())
    }

    /// Lowercase hex HMAC-SHA256 over `"<cardId>:<token>"`.
    pub fn sign(&self, card_id: &str, token: &str) -> String {
        self.mac_hex(canonical_material(card_id, token).as_bytes())
    }

    /// Check `signature` against the expected MAC in constant time.
    ///
    /// Only lowercase hex of the full MAC length is ever accepted.
    pub fn verify(&self, card_id: &str, token: &str, signature: &str) -> bool {
        if signature.len() != SIGNATURE_HEX_LEN
            || !signature
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return false;
        }
        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let mut mac = self.keyed();
        mac.update(canonical_material(card_id, token).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    fn keyed(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new(GenericArray::from_slice(&self.inner.expose_secret()[..]))
    }

    fn mac_hex(&self, material: &[u8]) -> String {
        let mut mac = self.keyed();
        mac.update(material);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self {
            inner: Secret::new(*self.inner.expose_secret()),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// Build the byte string covered by the signature.
pub fn canonical_material(card_id: &str, token: &str) -> String {
    format!("{}:{}", card_id, token)
}
