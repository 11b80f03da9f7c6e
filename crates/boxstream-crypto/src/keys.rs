//! Key material: 32-byte key + 24-byte initial nonce
//!
//! Accepted shapes:
//! ```text
//! secret (56 bytes) = key[0..32] || nonce[32..56]
//! key (32 bytes) + nonce (24 bytes)
//! ```
//! Anything else is rejected at construction time.

use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::{BoxStreamError, BoxStreamResult};
use crate::{NonceBytes, KEY_SIZE, NONCE_SIZE, SECRET_SIZE};

/// Key and initial nonce for one direction of a box-stream. Zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    key: [u8; KEY_SIZE],
    nonce: NonceBytes,
}

/// Which side of a duplex channel a [`KeyMaterial::directional`] derivation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Traffic sent by the side that opened the connection
    InitiatorToResponder,
    /// Traffic sent by the side that accepted the connection
    ResponderToInitiator,
}

impl Direction {
    fn info(&self) -> &'static [u8] {
        match self {
            Self::InitiatorToResponder => b"boxstream initiator->responder",
            Self::ResponderToInitiator => b"boxstream responder->initiator",
        }
    }
}

impl KeyMaterial {
    /// Build from a 56-byte secret alone, or a 32-byte key plus a 24-byte nonce.
    pub fn new(key: &[u8], nonce: Option<&[u8]>) -> BoxStreamResult<Self> {
        match nonce {
            None if key.len() == SECRET_SIZE => Self::from_secret(key),
            Some(nonce) => Self::from_parts(key, nonce),
            None => Err(BoxStreamError::InvalidKeyMaterial {
                key_len: key.len(),
                nonce_len: None,
            }),
        }
    }

    /// Split a 56-byte secret into key and initial nonce.
    pub fn from_secret(secret: &[u8]) -> BoxStreamResult<Self> {
        if secret.len() != SECRET_SIZE {
            return Err(BoxStreamError::InvalidKeyMaterial {
                key_len: secret.len(),
                nonce_len: None,
            });
        }
        let (key, nonce) = secret.split_at(KEY_SIZE);
        Self::from_parts(key, nonce)
    }

    /// Use an explicit 32-byte key and 24-byte nonce as-is.
    pub fn from_parts(key: &[u8], nonce: &[u8]) -> BoxStreamResult<Self> {
        if key.len() != KEY_SIZE || nonce.len() != NONCE_SIZE {
            return Err(BoxStreamError::InvalidKeyMaterial {
                key_len: key.len(),
                nonce_len: Some(nonce.len()),
            });
        }
        let mut material = Self {
            key: [0u8; KEY_SIZE],
            nonce: [0u8; NONCE_SIZE],
        };
        material.key.copy_from_slice(key);
        material.nonce.copy_from_slice(nonce);
        Ok(material)
    }

    /// Generate fresh random material.
    pub fn generate() -> Self {
        let mut secret = [0u8; SECRET_SIZE];
        rand::thread_rng().fill_bytes(&mut secret);
        let material = Self::split_secret(&secret);
        secret.zeroize();
        material
    }

    /// Deterministic material from a label: the first 56 bytes of SHA-512(label).
    ///
    /// Intended for tests and demos; a label is not a secret.
    pub fn from_label(label: &str) -> Self {
        let mut digest = Sha512::digest(label.as_bytes());
        let material = Self::split_secret(&digest[..SECRET_SIZE]);
        digest.as_mut_slice().zeroize();
        material
    }

    /// Independent material for one direction of a duplex channel (HKDF-SHA256).
    pub fn directional(&self, direction: Direction) -> BoxStreamResult<Self> {
        let mut ikm = self.to_secret();
        let hkdf = Hkdf::<Sha256>::new(None, &ikm);
        ikm.zeroize();

        let mut okm = [0u8; SECRET_SIZE];
        hkdf.expand(direction.info(), &mut okm)
            .map_err(|e| BoxStreamError::Cipher(format!("HKDF expand failed: {e}")))?;
        let material = Self::split_secret(&okm);
        okm.zeroize();
        Ok(material)
    }

    /// Decode a base64 56-byte secret (surrounding whitespace ignored).
    pub fn from_base64(encoded: &str) -> BoxStreamResult<Self> {
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())?;
        let material = Self::from_secret(&raw);
        raw.zeroize();
        material
    }

    /// Encode as a base64 56-byte secret.
    pub fn to_base64(&self) -> String {
        let mut secret = self.to_secret();
        let encoded = base64::engine::general_purpose::STANDARD.encode(secret);
        secret.zeroize();
        encoded
    }

    /// The combined 56-byte secret.
    pub fn to_secret(&self) -> [u8; SECRET_SIZE] {
        let mut secret = [0u8; SECRET_SIZE];
        secret[..KEY_SIZE].copy_from_slice(&self.key);
        secret[KEY_SIZE..].copy_from_slice(&self.nonce);
        secret
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn nonce(&self) -> &NonceBytes {
        &self.nonce
    }

    fn split_secret(secret: &[u8]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        key.copy_from_slice(&secret[..KEY_SIZE]);
        nonce.copy_from_slice(&secret[KEY_SIZE..SECRET_SIZE]);
        Self { key, nonce }
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("nonce", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Vec<u8> {
        (0u8..56).collect()
    }

    #[test]
    fn secret_splits_into_key_and_nonce() {
        let material = KeyMaterial::new(&secret(), None).unwrap();
        assert_eq!(material.key(), &secret()[..32]);
        assert_eq!(material.nonce(), &secret()[32..]);
    }

    #[test]
    fn explicit_parts_are_used_as_is() {
        let material = KeyMaterial::new(&[1u8; 32], Some(&[2u8; 24])).unwrap();
        assert_eq!(material.key(), &[1u8; 32]);
        assert_eq!(material.nonce(), &[2u8; 24]);
    }

    #[test]
    fn other_lengths_are_rejected() {
        for (key_len, nonce_len) in [(32, None), (55, None), (57, None), (56, Some(24)), (32, Some(23))] {
            let key = vec![0u8; key_len];
            let nonce = nonce_len.map(|n| vec![0u8; n]);
            let result = KeyMaterial::new(&key, nonce.as_deref());
            assert!(
                matches!(result, Err(BoxStreamError::InvalidKeyMaterial { .. })),
                "key {key_len} / nonce {nonce_len:?} must be rejected"
            );
        }
    }

    #[test]
    fn secret_roundtrips() {
        let material = KeyMaterial::from_secret(&secret()).unwrap();
        assert_eq!(material.to_secret().to_vec(), secret());
    }

    #[test]
    fn base64_roundtrip() {
        let material = KeyMaterial::generate();
        let encoded = material.to_base64();
        let decoded = KeyMaterial::from_base64(&format!("{encoded}\n")).unwrap();
        assert_eq!(material.to_secret(), decoded.to_secret());
    }

    #[test]
    fn base64_rejects_wrong_length() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(matches!(
            KeyMaterial::from_base64(&short),
            Err(BoxStreamError::InvalidKeyMaterial { key_len: 32, .. })
        ));
    }

    #[test]
    fn base64_rejects_malformed_text() {
        let err = KeyMaterial::from_base64("not base64!").unwrap_err();
        assert!(matches!(err, BoxStreamError::InvalidKeyEncoding(_)));
        assert!(err.to_string().contains("not valid base64"));
    }

    #[test]
    fn generated_material_differs() {
        let a = KeyMaterial::generate();
        let b = KeyMaterial::generate();
        assert_ne!(a.to_secret(), b.to_secret(), "random material must differ");
    }

    #[test]
    fn label_material_is_sha512_prefix() {
        let material = KeyMaterial::from_label("encrypt a stream - test 1");
        let digest = Sha512::digest(b"encrypt a stream - test 1");
        assert_eq!(material.to_secret().as_slice(), &digest[..56]);
    }

    #[test]
    fn directions_are_independent() {
        let shared = KeyMaterial::from_label("duplex");
        let out = shared.directional(Direction::InitiatorToResponder).unwrap();
        let back = shared.directional(Direction::ResponderToInitiator).unwrap();
        assert_ne!(out.to_secret(), back.to_secret());
        assert_ne!(out.to_secret(), shared.to_secret());

        let again = shared.directional(Direction::InitiatorToResponder).unwrap();
        assert_eq!(out.to_secret(), again.to_secret(), "derivation must be deterministic");
    }

    #[test]
    fn debug_is_redacted() {
        let debug = format!("{:?}", KeyMaterial::from_label("x"));
        assert!(debug.contains("REDACTED"));
    }
}
