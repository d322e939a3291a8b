//! Credential protection collaborators
//!
//! The store never performs cryptography itself; it only transports
//! credential material. Two seams are defined here:
//!
//! - [`PublicKey`], the parse/serialize primitive for the key embedded next
//!   to encrypted passwords on the wire
//! - [`CredentialProtector`], the transform applied to credentials just
//!   before they are encoded, which a host application implements to
//!   opportunistically encrypt plaintext passwords
//!
//! The shipped [`PlaintextProtector`] is the identity transform for
//! installations without a master key.

use crate::error::{Result, StoreError};
use crate::site::Credentials;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Length of the raw key portion in bytes
const KEY_SIZE: usize = 32;

/// Length of the salt portion in bytes
const SALT_SIZE: usize = 32;

/// A public key used to encrypt stored passwords
///
/// On the wire the key is the base64 encoding of the raw key bytes
/// followed by the salt. Parsing validates length and base64 alphabet
/// only; whether the key pairs with an available private key is the host
/// application's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key: [u8; KEY_SIZE],
    salt: [u8; SALT_SIZE],
}

impl PublicKey {
    /// Construct from raw key and salt bytes
    pub fn new(key: [u8; KEY_SIZE], salt: [u8; SALT_SIZE]) -> Self {
        PublicKey { key, salt }
    }

    /// Parse the wire representation
    ///
    /// Fails with [`StoreError::InvalidKey`] if the input is not valid
    /// base64 or decodes to the wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| StoreError::invalid_key(e.to_string()))?;
        if raw.len() != KEY_SIZE + SALT_SIZE {
            return Err(StoreError::invalid_key(format!(
                "expected {} bytes, got {}",
                KEY_SIZE + SALT_SIZE,
                raw.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        let mut salt = [0u8; SALT_SIZE];
        key.copy_from_slice(&raw[..KEY_SIZE]);
        salt.copy_from_slice(&raw[KEY_SIZE..]);
        Ok(PublicKey { key, salt })
    }

    /// The wire representation: base64 of key followed by salt
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(KEY_SIZE + SALT_SIZE);
        raw.extend_from_slice(&self.key);
        raw.extend_from_slice(&self.salt);
        BASE64.encode(raw)
    }
}

/// Transform applied to credentials before they are persisted
///
/// Implementations may replace a [`Password::Plain`](crate::Password::Plain)
/// with its encrypted form when an encryption key is available. The codec
/// calls this exactly once per encode, on a copy of the credentials, so
/// implementations never see or mutate live site state.
pub trait CredentialProtector {
    /// Protect the given credentials in place
    fn protect(&self, credentials: &mut Credentials);
}

/// The identity transform: passwords stay in their current form
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextProtector;

impl CredentialProtector for PlaintextProtector {
    fn protect(&self, _credentials: &mut Credentials) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> PublicKey {
        PublicKey::new([7u8; KEY_SIZE], [9u8; SALT_SIZE])
    }

    #[test]
    fn test_base64_round_trip() {
        let key = sample_key();
        let encoded = key.to_base64();
        assert_eq!(PublicKey::from_base64(&encoded).unwrap(), key);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(PublicKey::from_base64("not@valid@base64").is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = BASE64.encode([1u8; 16]);
        let err = PublicKey::from_base64(&short).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let key = sample_key();
        let padded = format!("  {}\n", key.to_base64());
        assert_eq!(PublicKey::from_base64(&padded).unwrap(), key);
    }
}
