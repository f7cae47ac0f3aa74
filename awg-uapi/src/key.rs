//! Curve25519 key material and its base64 → hex transcoding

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

/// Length of a private, public or preshared key in bytes
pub const KEY_LEN: usize = 32;

/// A 32-byte key decoded from the configuration document.
///
/// The bytes are wiped on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a standard-base64 key, trimming surrounding whitespace.
    ///
    /// `field` names the configuration field the value came from and is
    /// carried in the error so the offending input can be identified.
    pub fn from_base64(field: &str, encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(Error::InvalidKey {
                field: field.to_string(),
                reason: "value is empty".into(),
            });
        }

        let decoded = Zeroizing::new(BASE64.decode(encoded).map_err(|e| Error::InvalidKey {
            field: field.to_string(),
            reason: e.to_string(),
        })?);

        if decoded.len() != KEY_LEN {
            return Err(Error::InvalidKey {
                field: field.to_string(),
                reason: format!("expected {} bytes, got {}", KEY_LEN, decoded.len()),
            });
        }

        // Filled in place, never through a stack copy
        let mut key = Self([0u8; KEY_LEN]);
        key.0.copy_from_slice(&decoded);
        Ok(key)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, as expected by the control protocol
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}
