//! Secret-box primitive seam
//!
//! The codec only needs `seal`, `open` and `open_detached` over a 32-byte key
//! and a 24-byte nonce. [`SecretBox`] captures that; [`Cipher`] implements it
//! for the two supported suites:
//!
//! - `xsalsa20poly1305`: NaCl `crypto_secretbox`, byte-compatible with
//!   libsodium `crypto_secretbox_easy` (`tag || ciphertext`)
//! - `xchacha20poly1305`: IETF XChaCha20-Poly1305
//!
//! Sealed output is always laid out `tag || ciphertext` regardless of suite.

use chacha20poly1305::aead::consts::{U16, U24};
use chacha20poly1305::aead::{AeadCore, AeadInPlace, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use crypto_secretbox::XSalsa20Poly1305;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{BoxStreamError, BoxStreamResult};
use crate::{NonceBytes, TagBytes, KEY_SIZE, TAG_SIZE};

/// Opening a sealed record failed: wrong key, wrong nonce, or modified bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("authentication failed")]
pub struct Unauthenticated;

/// Authenticated encryption keyed once, used with caller-managed nonces.
pub trait SecretBox {
    /// Encrypt `buffer` in place and return the detached tag.
    fn seal_in_place_detached(
        &self,
        nonce: &NonceBytes,
        buffer: &mut [u8],
    ) -> BoxStreamResult<TagBytes>;

    /// Verify `tag` over `buffer` and decrypt it in place.
    ///
    /// On failure `buffer` is left untouched.
    fn open_in_place_detached(
        &self,
        nonce: &NonceBytes,
        buffer: &mut [u8],
        tag: &TagBytes,
    ) -> Result<(), Unauthenticated>;

    /// Seal `plaintext`, returning `tag || ciphertext`.
    fn seal(&self, nonce: &NonceBytes, plaintext: &[u8]) -> BoxStreamResult<Vec<u8>> {
        let mut sealed = vec![0u8; TAG_SIZE + plaintext.len()];
        sealed[TAG_SIZE..].copy_from_slice(plaintext);
        let tag = self.seal_in_place_detached(nonce, &mut sealed[TAG_SIZE..])?;
        sealed[..TAG_SIZE].copy_from_slice(&tag);
        Ok(sealed)
    }

    /// Open `tag || ciphertext`.
    fn open(&self, nonce: &NonceBytes, sealed: &[u8]) -> Result<Vec<u8>, Unauthenticated> {
        if sealed.len() < TAG_SIZE {
            return Err(Unauthenticated);
        }
        let (tag, ciphertext) = sealed.split_at(TAG_SIZE);
        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(tag);
        self.open_detached(&tag_bytes, ciphertext, nonce)
    }

    /// Open a ciphertext whose tag travelled separately.
    fn open_detached(
        &self,
        tag: &TagBytes,
        ciphertext: &[u8],
        nonce: &NonceBytes,
    ) -> Result<Vec<u8>, Unauthenticated> {
        let mut plaintext = ciphertext.to_vec();
        self.open_in_place_detached(nonce, &mut plaintext, tag)?;
        Ok(plaintext)
    }
}

/// Supported secret-box constructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherSuite {
    #[default]
    XSalsa20Poly1305,
    XChaCha20Poly1305,
}

impl CipherSuite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XSalsa20Poly1305 => "xsalsa20poly1305",
            Self::XChaCha20Poly1305 => "xchacha20poly1305",
        }
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CipherSuite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xsalsa20poly1305" | "xsalsa20-poly1305" | "secretbox" => Ok(Self::XSalsa20Poly1305),
            "xchacha20poly1305" | "xchacha20-poly1305" => Ok(Self::XChaCha20Poly1305),
            other => Err(format!(
                "unknown cipher suite '{other}' (expected xsalsa20poly1305 or xchacha20poly1305)"
            )),
        }
    }
}

/// A keyed secret-box for one of the [`CipherSuite`]s.
#[derive(Clone)]
pub enum Cipher {
    XSalsa20Poly1305(XSalsa20Poly1305),
    XChaCha20Poly1305(XChaCha20Poly1305),
}

impl Cipher {
    pub fn new(suite: CipherSuite, key: &[u8; KEY_SIZE]) -> Self {
        match suite {
            CipherSuite::XSalsa20Poly1305 => Self::XSalsa20Poly1305(XSalsa20Poly1305::new(key.into())),
            CipherSuite::XChaCha20Poly1305 => {
                Self::XChaCha20Poly1305(XChaCha20Poly1305::new(key.into()))
            }
        }
    }

    pub fn suite(&self) -> CipherSuite {
        match self {
            Self::XSalsa20Poly1305(_) => CipherSuite::XSalsa20Poly1305,
            Self::XChaCha20Poly1305(_) => CipherSuite::XChaCha20Poly1305,
        }
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("suite", &self.suite())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretBox for Cipher {
    fn seal_in_place_detached(
        &self,
        nonce: &NonceBytes,
        buffer: &mut [u8],
    ) -> BoxStreamResult<TagBytes> {
        match self {
            Self::XSalsa20Poly1305(aead) => seal_detached(aead, nonce, buffer),
            Self::XChaCha20Poly1305(aead) => seal_detached(aead, nonce, buffer),
        }
    }

    fn open_in_place_detached(
        &self,
        nonce: &NonceBytes,
        buffer: &mut [u8],
        tag: &TagBytes,
    ) -> Result<(), Unauthenticated> {
        match self {
            Self::XSalsa20Poly1305(aead) => open_detached(aead, nonce, buffer, tag),
            Self::XChaCha20Poly1305(aead) => open_detached(aead, nonce, buffer, tag),
        }
    }
}

fn seal_detached<A>(aead: &A, nonce: &NonceBytes, buffer: &mut [u8]) -> BoxStreamResult<TagBytes>
where
    A: AeadInPlace + AeadCore<NonceSize = U24, TagSize = U16>,
{
    let tag = aead
        .encrypt_in_place_detached(chacha20poly1305::aead::Nonce::<A>::from_slice(nonce), b"", buffer)
        .map_err(|e| BoxStreamError::Cipher(format!("seal failed: {e}")))?;

    let mut out = [0u8; TAG_SIZE];
    out.copy_from_slice(&tag);
    Ok(out)
}

fn open_detached<A>(
    aead: &A,
    nonce: &NonceBytes,
    buffer: &mut [u8],
    tag: &TagBytes,
) -> Result<(), Unauthenticated>
where
    A: AeadInPlace + AeadCore<NonceSize = U24, TagSize = U16>,
{
    aead.decrypt_in_place_detached(
        chacha20poly1305::aead::Nonce::<A>::from_slice(nonce),
        b"",
        buffer,
        chacha20poly1305::aead::Tag::<A>::from_slice(tag),
    )
    .map_err(|_| Unauthenticated)
}
