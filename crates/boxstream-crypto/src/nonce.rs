//! Big-endian nonce arithmetic
//!
//! A nonce is a fixed-width buffer read as an unsigned big-endian integer.
//! [`increment`] adds one with carry and wraps to zero past the maximum.
//! [`NonceCursor`] wraps a 24-byte counter so the encoder and decoder consume
//! nonce values through the same two operations and cannot drift apart.

use crate::NonceBytes;

/// Increment `buf` in place as a big-endian integer, wrapping to zero on overflow.
///
/// Returns the same buffer so calls can be chained.
pub fn increment(buf: &mut [u8]) -> &mut [u8] {
    for byte in buf.iter_mut().rev() {
        if *byte == u8::MAX {
            *byte = 0;
        } else {
            *byte += 1;
            break;
        }
    }
    buf
}

/// A live nonce counter owned by one engine instance.
#[derive(Clone, PartialEq, Eq)]
pub struct NonceCursor {
    value: NonceBytes,
}

impl NonceCursor {
    pub fn new(seed: NonceBytes) -> Self {
        Self { value: seed }
    }

    /// Current value, unchanged.
    pub fn peek(&self) -> &NonceBytes {
        &self.value
    }

    /// Advance by one and return the new value.
    pub fn consume_next(&mut self) -> NonceBytes {
        self.advance();
        self.value
    }

    /// Advance by one without reading the value.
    pub fn advance(&mut self) {
        increment(&mut self.value);
    }
}

impl std::fmt::Debug for NonceCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceCursor")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
